//! Agent CLI command construction.
//!
//! Each supported agent CLI has its own flag grammar. [`AgentCli`] is a closed
//! set: adding a provider means adding a variant, and every `match` over it
//! must be updated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::core::types::{CommandSpec, MatrixItem};

/// Environment variable the Gemini CLI reads its system settings path from.
pub const GEMINI_SETTINGS_ENV: &str = "GEMINI_CLI_SYSTEM_SETTINGS_PATH";

/// Known agent CLIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCli {
    Codex,
    Claude,
    Gemini,
}

/// Per-batch inputs to command construction.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory for the agent (the item's output directory).
    pub output_dir: PathBuf,
    /// Settings file for the Gemini CLI.
    pub gemini_settings_path: Option<PathBuf>,
}

impl AgentCli {
    pub const ALL: [AgentCli; 3] = [AgentCli::Codex, AgentCli::Claude, AgentCli::Gemini];

    /// Resolve a provider id (case-insensitive). Unknown ids are an error.
    pub fn from_provider_id(id: &str) -> Result<Self> {
        for cli in Self::ALL {
            if cli.id().eq_ignore_ascii_case(id) {
                return Ok(cli);
            }
        }
        bail!(
            "unknown provider {id:?} (expected one of: {})",
            Self::ALL.map(AgentCli::id).join(", ")
        )
    }

    pub fn id(self) -> &'static str {
        match self {
            AgentCli::Codex => "codex",
            AgentCli::Claude => "claude",
            AgentCli::Gemini => "gemini",
        }
    }

    /// Build the invocation for one item and rendered prompt.
    pub fn build_command(
        self,
        item: &MatrixItem,
        prompt: &str,
        options: &CommandOptions,
    ) -> CommandSpec {
        let model_id = item.model.id.as_str();
        let output_dir = options.output_dir.as_path();
        let (args, env) = match self {
            AgentCli::Codex => (codex_args(model_id, output_dir, prompt), BTreeMap::new()),
            AgentCli::Claude => (claude_args(model_id, prompt), BTreeMap::new()),
            AgentCli::Gemini => (
                gemini_args(model_id, prompt),
                gemini_env(options.gemini_settings_path.as_deref()),
            ),
        };
        CommandSpec {
            command: item.binary.clone(),
            args,
            env,
            cwd: Some(options.output_dir.clone()),
        }
    }
}

fn codex_args(model_id: &str, output_dir: &Path, prompt: &str) -> Vec<String> {
    vec![
        "exec".to_string(),
        "--model".to_string(),
        model_id.to_string(),
        "--dangerously-bypass-approvals-and-sandbox".to_string(),
        // The output directory is a fresh, non-git directory.
        "--skip-git-repo-check".to_string(),
        "--cd".to_string(),
        output_dir.display().to_string(),
        prompt.to_string(),
    ]
}

fn claude_args(model_id: &str, prompt: &str) -> Vec<String> {
    vec![
        "--print".to_string(),
        "--model".to_string(),
        model_id.to_string(),
        "--dangerously-skip-permissions".to_string(),
        "--output-format".to_string(),
        "text".to_string(),
        prompt.to_string(),
    ]
}

fn gemini_args(model_id: &str, prompt: &str) -> Vec<String> {
    vec![
        "--model".to_string(),
        model_id.to_string(),
        "--yolo".to_string(),
        "--prompt".to_string(),
        prompt.to_string(),
    ]
}

fn gemini_env(settings_path: Option<&Path>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Some(path) = settings_path {
        env.insert(GEMINI_SETTINGS_ENV.to_string(), path.display().to_string());
    }
    env
}

/// Build the agent command for a matrix item.
///
/// Fails only when the item's provider is not a known agent CLI.
pub fn build_agent_command(
    item: &MatrixItem,
    prompt: &str,
    options: &CommandOptions,
) -> Result<CommandSpec> {
    let cli = AgentCli::from_provider_id(&item.provider_id)?;
    Ok(cli.build_command(item, prompt, options))
}
