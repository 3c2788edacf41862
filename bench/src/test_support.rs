//! Test-only helpers for building catalogs, configs, and fake agents.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::types::{
    FailureCategory, GameSpec, MatrixItem, ModelSpec, ProviderSpec, RunResult, SkipReason,
};
use crate::io::config::{Defaults, HarnessConfig};

/// Game with `name` derived from `key`.
pub fn game(key: &str, release_year: i32) -> GameSpec {
    GameSpec {
        key: key.to_string(),
        name: format!("{key} title"),
        release_year,
    }
}

/// Provider whose binary equals its id and whose model ids equal their keys.
pub fn provider(id: &str, model_keys: &[&str]) -> ProviderSpec {
    ProviderSpec {
        id: id.to_string(),
        binary: id.to_string(),
        models: model_keys
            .iter()
            .map(|key| ModelSpec {
                key: (*key).to_string(),
                id: (*key).to_string(),
                label: None,
            })
            .collect(),
    }
}

/// Matrix item; the binary equals the provider id.
pub fn item(provider_id: &str, model_key: &str, model_id: &str, game_key: &str) -> MatrixItem {
    MatrixItem {
        game: game(game_key, 1980),
        provider_id: provider_id.to_string(),
        binary: provider_id.to_string(),
        model: ModelSpec {
            key: model_key.to_string(),
            id: model_id.to_string(),
            label: None,
        },
    }
}

/// Minimal ledger row with the given category.
pub fn run_result(run_id: &str, category: FailureCategory, skipped: bool) -> RunResult {
    RunResult {
        batch_id: "batch".to_string(),
        run_id: run_id.to_string(),
        index: 1,
        game_key: "pong".to_string(),
        game_name: "Pong".to_string(),
        release_year: 1972,
        provider_id: "codex".to_string(),
        model_key: "m".to_string(),
        model_id: "m".to_string(),
        model_label: None,
        output_dir: PathBuf::from("/out"),
        artifact_dir: PathBuf::from("/runs/batch").join(run_id),
        backup_dir: None,
        dry_run: false,
        skipped,
        skip_reason: skipped.then_some(SkipReason::ExistingOutput),
        prompt_sha256: None,
        started_at: "2026-01-01T00:00:00+00:00".to_string(),
        finished_at: "2026-01-01T00:00:01+00:00".to_string(),
        duration_ms: 1000,
        agent: None,
        validation: None,
        failure_category: category,
    }
}

/// Config rooted at `root` (`output/`, `runs/`, `backups/`) with shell-based
/// install/build commands.
pub fn config_in(root: &Path, games: Vec<GameSpec>, providers: Vec<ProviderSpec>) -> HarnessConfig {
    HarnessConfig {
        defaults: Defaults {
            prompt_path: root.join("prompt.md"),
            output_base_dir: root.join("output"),
            runs_base_dir: root.join("runs"),
            backup_base_dir: root.join("backups"),
            timeout_minutes: 1,
            gemini_settings_path: None,
            install_command: vec!["sh".to_string(), "-c".to_string(), "echo install".to_string()],
            build_command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "mkdir -p dist && printf '<canvas></canvas>' > dist/index.html && printf '' > dist/main.js"
                    .to_string(),
            ],
        },
        games,
        providers,
    }
}

/// Write an executable shell script standing in for an agent CLI.
#[cfg(unix)]
pub fn write_agent_script(path: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create script dir");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
    path.to_path_buf()
}
