//! `gamebench`: run coding-agent CLIs against a catalog of game tasks.
//!
//! Each (game, provider, model) item gets its own output directory; existing
//! output is skipped unless `--force` archives it first. Every run leaves its
//! prompt, command, logs, and verdict under `runsBaseDir/<batchId>/`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;

use gamebench::batch::{BatchRequest, run_batch};
use gamebench::core::matrix::MatrixFilters;
use gamebench::exit_codes;
use gamebench::io::config::load_config;
use gamebench::io::prompt::load_template;
use gamebench::logging;

#[derive(Parser, Debug)]
#[command(
    name = "gamebench",
    version,
    about = "Benchmark coding-agent CLIs on a catalog of game tasks"
)]
struct Cli {
    /// Harness config (JSON, or TOML by extension).
    #[arg(long, default_value = "gamebench.json")]
    config: PathBuf,
    /// Prompt template; overrides `defaults.promptPath`.
    #[arg(long)]
    prompt: Option<PathBuf>,
    /// Comma-separated game keys.
    #[arg(long)]
    games: Option<String>,
    /// Comma-separated provider ids.
    #[arg(long)]
    agents: Option<String>,
    /// Comma-separated `modelKey` or `providerId:modelKey` entries.
    #[arg(long)]
    models: Option<String>,
    /// Per-subprocess timeout in minutes; overrides `defaults.timeoutMinutes`.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_min: Option<u64>,
    /// Archive existing output directories and regenerate them.
    #[arg(long)]
    force: bool,
    /// Render prompts and commands without running anything.
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(exit_codes::FAILED);
        }
    };
    logging::init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(&cli.config)?;
    if let Some(prompt) = cli.prompt {
        config.defaults.prompt_path = prompt;
    }
    if let Some(minutes) = cli.timeout_min {
        config.defaults.timeout_minutes = minutes;
    }
    let template = load_template(&config.defaults.prompt_path)?;
    let filters = MatrixFilters::parse(
        cli.games.as_deref(),
        cli.agents.as_deref(),
        cli.models.as_deref(),
    )
    .context("parse filters")?;

    let mut request = BatchRequest::new(&config, &template, filters);
    request.force = cli.force;
    request.dry_run = cli.dry_run;

    let outcome = run_batch(&request)?;
    println!(
        "done: success={} failed={} skipped={}",
        outcome.tally.success, outcome.tally.failed, outcome.tally.skipped
    );
    println!("summary: {}", outcome.summary_path.display());
    Ok(outcome.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "gamebench",
            "--config",
            "bench.toml",
            "--games",
            "pong,tetris",
            "--agents",
            "codex",
            "--models",
            "codex:gpt-5",
            "--timeout-min",
            "15",
            "--force",
            "--dry-run",
        ])
        .expect("parse");
        assert_eq!(cli.config, PathBuf::from("bench.toml"));
        assert_eq!(cli.games.as_deref(), Some("pong,tetris"));
        assert_eq!(cli.timeout_min, Some(15));
        assert!(cli.force);
        assert!(cli.dry_run);
    }

    #[test]
    fn defaults_config_path() {
        let cli = Cli::try_parse_from(["gamebench"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("gamebench.json"));
        assert!(!cli.force);
    }

    #[test]
    fn rejects_unknown_flags_and_zero_timeout() {
        assert!(Cli::try_parse_from(["gamebench", "--retries", "3"]).is_err());
        assert!(Cli::try_parse_from(["gamebench", "--timeout-min", "0"]).is_err());
    }
}
