//! Per-run artifacts and the batch summary.
//!
//! Layout: `runsBaseDir/<batchId>/<runId>/{prompt.txt, command.json, agent.*.log,
//! validation.*.log, validation.json, result.json}` plus
//! `runsBaseDir/<batchId>/summary.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{FailureCategory, RunResult};

pub const SUMMARY_FILE: &str = "summary.json";

/// Fresh batch id: UTC timestamp plus a short random suffix.
pub fn generate_batch_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    build_batch_id(&timestamp, &generate_short_id())
}

pub fn build_batch_id(timestamp: &str, short_id: &str) -> String {
    format!("{timestamp}_{short_id}")
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

/// Run id for the item at 1-based `index`; sorts in matrix order.
pub fn run_id(index: usize, output_dir_name: &str) -> String {
    format!("{index:03}-{output_dir_name}")
}

pub fn batch_dir(runs_base: &Path, batch_id: &str) -> PathBuf {
    runs_base.join(batch_id)
}

/// File locations inside one run's artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(batch_dir: &Path, run_id: &str) -> Self {
        Self {
            dir: batch_dir.join(run_id),
        }
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create artifact dir {}", self.dir.display()))
    }

    pub fn prompt(&self) -> PathBuf {
        self.dir.join("prompt.txt")
    }

    pub fn command(&self) -> PathBuf {
        self.dir.join("command.json")
    }

    pub fn agent_stdout(&self) -> PathBuf {
        self.dir.join("agent.stdout.log")
    }

    pub fn agent_stderr(&self) -> PathBuf {
        self.dir.join("agent.stderr.log")
    }

    pub fn validation_stdout(&self) -> PathBuf {
        self.dir.join("validation.stdout.log")
    }

    pub fn validation_stderr(&self) -> PathBuf {
        self.dir.join("validation.stderr.log")
    }

    pub fn validation(&self) -> PathBuf {
        self.dir.join("validation.json")
    }

    pub fn result(&self) -> PathBuf {
        self.dir.join("result.json")
    }
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}

/// Like [`write_json`], but atomic (temp file + rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Persist one finished run.
pub fn write_result(paths: &ArtifactPaths, result: &RunResult) -> Result<()> {
    write_json_atomic(&paths.result(), result)?;
    debug!(run_id = %result.run_id, category = result.failure_category.as_str(), "result written");
    Ok(())
}

/// Rewrite `summary.json` with every result recorded so far, in matrix order.
pub fn write_summary(batch_dir: &Path, results: &[RunResult]) -> Result<PathBuf> {
    let path = batch_dir.join(SUMMARY_FILE);
    write_json_atomic(&path, &results)?;
    Ok(path)
}

/// Final console tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn from_results(results: &[RunResult]) -> Self {
        let mut tally = Tally::default();
        for result in results {
            if result.skipped {
                tally.skipped += 1;
            } else if result.failure_category == FailureCategory::None {
                tally.success += 1;
            } else {
                tally.failed += 1;
            }
        }
        tally
    }
}
