//! Harness configuration: defaults, the game catalog, and agent providers.
//!
//! JSON by default; a `.toml` extension selects TOML with the same schema.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::AgentCli;
use crate::core::types::{GameSpec, ProviderSpec};

/// Full harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    #[serde(default)]
    pub defaults: Defaults,
    pub games: Vec<GameSpec>,
    pub providers: Vec<ProviderSpec>,
}

/// Batch-wide defaults. Missing fields take the values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Defaults {
    /// Prompt template with `{{TOKEN}}` placeholders.
    pub prompt_path: PathBuf,
    /// Parent of every per-item output directory.
    pub output_base_dir: PathBuf,
    /// Parent of every batch directory.
    pub runs_base_dir: PathBuf,
    /// Where prior outputs are moved before `--force` regeneration.
    pub backup_base_dir: PathBuf,
    /// Per-subprocess wall-clock budget.
    pub timeout_minutes: u64,
    /// Settings file handed to the Gemini CLI, if any.
    pub gemini_settings_path: Option<PathBuf>,
    pub install_command: Vec<String>,
    pub build_command: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            prompt_path: PathBuf::from("prompts/game.md"),
            output_base_dir: PathBuf::from("output"),
            runs_base_dir: PathBuf::from("runs"),
            backup_base_dir: PathBuf::from("backups"),
            timeout_minutes: 30,
            gemini_settings_path: None,
            install_command: vec!["npm".to_string(), "install".to_string()],
            build_command: vec!["npm".to_string(), "run".to_string(), "build".to_string()],
        }
    }
}

impl Defaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.prompt_path = resolve(base, &self.prompt_path);
        self.output_base_dir = resolve(base, &self.output_base_dir);
        self.runs_base_dir = resolve(base, &self.runs_base_dir);
        self.backup_base_dir = resolve(base, &self.backup_base_dir);
        if let Some(settings) = &self.gemini_settings_path {
            self.gemini_settings_path = Some(resolve(base, settings));
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl HarnessConfig {
    /// Check catalog invariants: unique keys/ids, known agent CLIs, sane defaults.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.timeout_minutes == 0 {
            bail!("defaults.timeoutMinutes must be > 0");
        }
        if self.defaults.timeout_minutes.checked_mul(60).is_none() {
            bail!(
                "defaults.timeoutMinutes {} is too large",
                self.defaults.timeout_minutes
            );
        }
        validate_command("defaults.installCommand", &self.defaults.install_command)?;
        validate_command("defaults.buildCommand", &self.defaults.build_command)?;

        let mut game_keys = BTreeSet::new();
        for (index, game) in self.games.iter().enumerate() {
            if game.key.trim().is_empty() {
                bail!("games[{index}].key must be non-empty");
            }
            if !game_keys.insert(game.key.to_ascii_lowercase()) {
                bail!("duplicate game key {}", game.key);
            }
        }

        let mut provider_ids = BTreeSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            if provider.id.trim().is_empty() {
                bail!("providers[{index}].id must be non-empty");
            }
            if !provider_ids.insert(provider.id.to_ascii_lowercase()) {
                bail!("duplicate provider id {}", provider.id);
            }
            if provider.binary.trim().is_empty() {
                bail!("provider {} binary must be non-empty", provider.id);
            }
            AgentCli::from_provider_id(&provider.id)
                .with_context(|| format!("providers[{index}]"))?;

            let mut model_keys = BTreeSet::new();
            for model in &provider.models {
                if model.key.trim().is_empty() || model.id.trim().is_empty() {
                    bail!("provider {} has a model with empty key or id", provider.id);
                }
                if !model_keys.insert(model.key.to_ascii_lowercase()) {
                    bail!("duplicate model key {} for provider {}", model.key, provider.id);
                }
            }
        }
        Ok(())
    }
}

fn validate_command(label: &str, command: &[String]) -> Result<()> {
    if command.is_empty() || command[0].trim().is_empty() {
        return Err(anyhow!("{label} must be a non-empty array"));
    }
    Ok(())
}

/// Load, resolve, and validate a config file.
///
/// Relative paths in `defaults` resolve against the config file's directory.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let mut cfg = parse_config(path, &contents)?;
    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::path::absolute(parent)
            .with_context(|| format!("resolve config dir {}", parent.display()))?,
        _ => std::env::current_dir().context("resolve current dir")?,
    };
    cfg.defaults.resolve_paths(&base);
    cfg.validate()
        .with_context(|| format!("validate config {}", path.display()))?;
    debug!(
        path = %path.display(),
        games = cfg.games.len(),
        providers = cfg.providers.len(),
        "config loaded"
    );
    Ok(cfg)
}

fn parse_config(path: &Path, contents: &str) -> Result<HarnessConfig> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(contents).with_context(|| format!("parse config {}", path.display()))
    } else {
        serde_json::from_str(contents).with_context(|| format!("parse config {}", path.display()))
    }
}
