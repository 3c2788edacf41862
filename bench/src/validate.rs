//! Post-run validation: install, build, and a filesystem smoke test of `dist/`.
//!
//! This answers only "did the agent produce a buildable, plausibly renderable
//! web project". Nothing is executed in a browser.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::types::{CommandSpec, SmokeResult, StepOutcome, ValidationSummary};
use crate::io::process::{DEFAULT_KILL_GRACE, ProcessRequest, run_process};
use crate::io::record::ArtifactPaths;

/// Commands and limits for the validation steps.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub install_command: Vec<String>,
    pub build_command: Vec<String>,
    /// Budget for each step.
    pub timeout: Duration,
    pub kill_grace: Duration,
}

impl ValidationConfig {
    pub fn new(install_command: Vec<String>, build_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            install_command,
            build_command,
            timeout,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Validate the project an agent wrote into `output_dir`.
///
/// Both steps share `validation.stdout.log`/`validation.stderr.log` as one
/// transcript. Build runs only if install passed.
#[instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub fn run_validation(
    output_dir: &Path,
    artifacts: &ArtifactPaths,
    config: &ValidationConfig,
) -> Result<ValidationSummary> {
    if !output_dir.join("package.json").is_file() {
        info!("package.json missing, skipping install and build");
        return Ok(ValidationSummary::missing_package_json());
    }

    let install = run_step(
        "install",
        &config.install_command,
        output_dir,
        artifacts,
        config,
        false,
    )?;
    let build = if install.passed() {
        run_step(
            "build",
            &config.build_command,
            output_dir,
            artifacts,
            config,
            true,
        )?
    } else {
        debug!("install failed, build not attempted");
        StepOutcome::NotAttempted
    };

    let smoke = smoke_test(&output_dir.join("dist"));
    let pass = install.passed() && build.passed() && smoke.pass;
    info!(
        install = install.passed(),
        build = build.passed(),
        smoke = smoke.pass,
        pass,
        "validation finished"
    );
    Ok(ValidationSummary {
        package_json_exists: true,
        install,
        build,
        smoke,
        pass,
    })
}

fn run_step(
    label: &str,
    command: &[String],
    output_dir: &Path,
    artifacts: &ArtifactPaths,
    config: &ValidationConfig,
    append_header: bool,
) -> Result<StepOutcome> {
    let (program, args) = command
        .split_first()
        .with_context(|| format!("{label} command is empty"))?;
    let spec = CommandSpec::new(program, args).in_dir(output_dir);

    let header = format!("== {label}: {} ==\n", spec.display());
    write_header(&artifacts.validation_stdout(), &header, append_header)?;
    write_header(&artifacts.validation_stderr(), &header, append_header)?;

    let request = ProcessRequest::new(spec, config.timeout)
        .with_logs(
            artifacts.validation_stdout(),
            artifacts.validation_stderr(),
            true,
        )
        .with_kill_grace(config.kill_grace);
    let run = run_process(&request).with_context(|| format!("run {label} step"))?;
    if run.timed_out {
        warn!(step = label, "validation step timed out");
    }
    Ok(StepOutcome::from_run(run))
}

fn write_header(path: &Path, header: &str, append: bool) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(header.as_bytes())
        .with_context(|| format!("write {}", path.display()))
}

/// Structural checks on a build output directory.
pub fn smoke_test(dist: &Path) -> SmokeResult {
    let dist_exists = dist.is_dir();
    let index_path = dist.join("index.html");
    let index_html_exists = dist_exists && index_path.is_file();
    let html = if index_html_exists {
        read_lossy(&index_path)
    } else {
        String::new()
    };

    let js_asset_found = dist_exists && (has_js_file(dist) || has_script_tag(&html));
    let html_has_game_surface = has_game_surface(&html);
    let pass = dist_exists && index_html_exists && js_asset_found && html_has_game_surface;
    SmokeResult {
        dist_exists,
        index_html_exists,
        js_asset_found,
        html_has_game_surface,
        pass,
    }
}

fn read_lossy(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "unreadable index.html");
            String::new()
        }
    }
}

fn has_js_file(dist: &Path) -> bool {
    WalkDir::new(dist)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("js"))
        })
}

fn has_script_tag(html: &str) -> bool {
    html.to_ascii_lowercase().contains("<script")
}

fn has_game_surface(html: &str) -> bool {
    use std::sync::LazyLock;
    static SURFACE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(
            r#"(?i)<canvas\b|(?:^|[\s"'])id\s*=\s*["']?(?:app|root|game)(?:["'\s/>]|$)|<main\b|<body\b"#,
        )
        .unwrap()
    });
    SURFACE_RE.is_match(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, contents).expect("write");
    }

    fn sh_config(install: &str, build: &str) -> ValidationConfig {
        ValidationConfig::new(
            vec!["sh".to_string(), "-c".to_string(), install.to_string()],
            vec!["sh".to_string(), "-c".to_string(), build.to_string()],
            Duration::from_secs(10),
        )
    }

    #[test]
    fn smoke_passes_for_root_div_and_sibling_script() {
        let temp = tempdir().expect("tempdir");
        let dist = temp.path().join("dist");
        write(
            &dist.join("index.html"),
            r#"<div id="root"></div><script src="main.js"></script>"#,
        );
        write(&dist.join("main.js"), "console.log('hi')");

        assert_eq!(
            smoke_test(&dist),
            SmokeResult {
                dist_exists: true,
                index_html_exists: true,
                js_asset_found: true,
                html_has_game_surface: true,
                pass: true,
            }
        );
    }

    #[test]
    fn smoke_finds_nested_js_assets() {
        let temp = tempdir().expect("tempdir");
        let dist = temp.path().join("dist");
        write(&dist.join("index.html"), "<CANVAS id=screen></CANVAS>");
        write(&dist.join("assets/deep/index-abc.JS"), "");
        let smoke = smoke_test(&dist);
        assert!(smoke.js_asset_found);
        assert!(smoke.html_has_game_surface);
        assert!(smoke.pass);
    }

    #[test]
    fn smoke_accepts_inline_script_without_js_file() {
        let temp = tempdir().expect("tempdir");
        let dist = temp.path().join("dist");
        write(&dist.join("index.html"), "<body><SCRIPT>start()</SCRIPT></body>");
        assert!(smoke_test(&dist).pass);
    }

    #[test]
    fn smoke_fails_without_surface_or_dist() {
        let temp = tempdir().expect("tempdir");
        let dist = temp.path().join("dist");
        let smoke = smoke_test(&dist);
        assert!(!smoke.dist_exists);
        assert!(!smoke.pass);

        write(&dist.join("index.html"), "<div id=\"rooted\"></div>");
        write(&dist.join("a.js"), "");
        let smoke = smoke_test(&dist);
        assert!(smoke.index_html_exists);
        assert!(smoke.js_asset_found);
        assert!(!smoke.html_has_game_surface);
        assert!(!smoke.pass);
    }

    #[test]
    fn mount_point_must_be_a_whole_id() {
        assert!(has_game_surface("<div id=\"app\"></div>"));
        assert!(has_game_surface("<div class=x id='game'></div>"));
        assert!(has_game_surface("<div id=root>"));
        assert!(!has_game_surface("<div data-id=\"app\"></div>"));
        assert!(!has_game_surface("<div id=\"game-over\"></div>"));
        assert!(!has_game_surface("<div id=\"application\"></div>"));
    }

    #[test]
    fn smoke_rejects_dist_file() {
        let temp = tempdir().expect("tempdir");
        let dist = temp.path().join("dist");
        write(&dist, "not a dir");
        let smoke = smoke_test(&dist);
        assert!(!smoke.dist_exists);
        assert!(!smoke.index_html_exists);
    }

    #[test]
    fn missing_package_json_short_circuits() {
        let temp = tempdir().expect("tempdir");
        let artifacts = ArtifactPaths::new(temp.path(), "run");
        artifacts.create().expect("artifacts");
        let output = temp.path().join("out");
        fs::create_dir_all(&output).expect("mkdir");

        let summary = run_validation(&output, &artifacts, &sh_config("exit 0", "exit 0"))
            .expect("validation");
        assert_eq!(summary, ValidationSummary::missing_package_json());
        assert!(!artifacts.validation_stdout().exists());
    }

    #[test]
    fn failed_install_leaves_build_not_attempted() {
        let temp = tempdir().expect("tempdir");
        let artifacts = ArtifactPaths::new(temp.path(), "run");
        artifacts.create().expect("artifacts");
        let output = temp.path().join("out");
        write(&output.join("package.json"), "{}");

        let summary = run_validation(
            &output,
            &artifacts,
            &sh_config("echo installing; exit 1", "touch built"),
        )
        .expect("validation");
        assert!(matches!(summary.install, StepOutcome::Failed { .. }));
        assert_eq!(summary.build, StepOutcome::NotAttempted);
        assert!(!output.join("built").exists());
        assert!(!summary.pass);

        let log = fs::read_to_string(artifacts.validation_stdout()).expect("log");
        assert!(log.starts_with("== install: sh -c echo installing; exit 1 ==\n"));
        assert!(log.contains("installing\n"));
    }

    #[test]
    fn full_pipeline_passes_and_shares_transcript() {
        let temp = tempdir().expect("tempdir");
        let artifacts = ArtifactPaths::new(temp.path(), "run");
        artifacts.create().expect("artifacts");
        let output = temp.path().join("out");
        write(&output.join("package.json"), "{}");

        let build = "mkdir -p dist && printf '<canvas></canvas>' > dist/index.html \
                     && printf '' > dist/game.js && echo built";
        let summary = run_validation(&output, &artifacts, &sh_config("echo installed", build))
            .expect("validation");
        assert!(summary.install.passed());
        assert!(summary.build.passed());
        assert!(summary.smoke.pass);
        assert!(summary.pass);

        let log = fs::read_to_string(artifacts.validation_stdout()).expect("log");
        let install_at = log.find("== install").expect("install header");
        let build_at = log.find("== build").expect("build header");
        assert!(install_at < log.find("installed").expect("install output"));
        assert!(build_at > install_at);
        assert!(log.ends_with("built\n"));
    }

    #[test]
    fn build_failure_fails_validation() {
        let temp = tempdir().expect("tempdir");
        let artifacts = ArtifactPaths::new(temp.path(), "run");
        artifacts.create().expect("artifacts");
        let output = temp.path().join("out");
        write(&output.join("package.json"), "{}");

        let summary = run_validation(&output, &artifacts, &sh_config("true", "exit 2"))
            .expect("validation");
        assert!(summary.install.passed());
        let build = summary.build.run().expect("build ran");
        assert_eq!(build.exit_code, Some(2));
        assert!(!summary.pass);
    }
}
