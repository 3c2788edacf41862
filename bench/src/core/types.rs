//! Shared data model for matrix items, commands, and run results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A task descriptor from the catalog ("implement this game").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSpec {
    /// Unique key (case-insensitive for filtering).
    pub key: String,
    /// Human-readable title rendered into prompts.
    pub name: String,
    /// Drives run ordering only.
    pub release_year: i32,
}

/// A model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Key unique within its provider; used in filters and output naming.
    pub key: String,
    /// Model identifier passed to the agent CLI.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An agent CLI and the models it is benchmarked with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Provider id; also selects the CLI flag grammar.
    pub id: String,
    /// Executable name or path.
    pub binary: String,
    pub models: Vec<ModelSpec>,
}

/// One (game, provider, model) triple, executed at most once per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixItem {
    pub game: GameSpec,
    pub provider_id: String,
    pub binary: String,
    pub model: ModelSpec,
}

impl MatrixItem {
    /// Console label: `provider:model -> game`.
    pub fn label(&self) -> String {
        format!(
            "{}:{} -> {}",
            self.provider_id, self.model.key, self.game.key
        )
    }
}

/// A fully resolved external invocation, persisted verbatim as `command.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Overrides layered onto the child's copy of the inherited environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(command: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for log headers.
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of exactly one subprocess execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandRunResult {
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    /// Authoritative over `exit_code`: a killed process may still report 0.
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandRunResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Result of one validation pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// An earlier step failed, so this one never ran.
    NotAttempted,
    Failed { run: CommandRunResult },
    Passed { run: CommandRunResult },
}

impl StepOutcome {
    pub fn from_run(run: CommandRunResult) -> Self {
        if run.succeeded() {
            StepOutcome::Passed { run }
        } else {
            StepOutcome::Failed { run }
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, StepOutcome::Passed { .. })
    }

    pub fn run(&self) -> Option<&CommandRunResult> {
        match self {
            StepOutcome::NotAttempted => None,
            StepOutcome::Failed { run } | StepOutcome::Passed { run } => Some(run),
        }
    }
}

/// Filesystem-only smoke test of `dist/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmokeResult {
    pub dist_exists: bool,
    pub index_html_exists: bool,
    pub js_asset_found: bool,
    pub html_has_game_surface: bool,
    pub pass: bool,
}

/// Install, build, and smoke outcomes for one produced project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub package_json_exists: bool,
    pub install: StepOutcome,
    pub build: StepOutcome,
    pub smoke: SmokeResult,
    /// Install passed, build passed, and smoke passed.
    pub pass: bool,
}

impl ValidationSummary {
    /// Summary for a project with no `package.json`: nothing ran, nothing passed.
    pub fn missing_package_json() -> Self {
        Self {
            package_json_exists: false,
            install: StepOutcome::NotAttempted,
            build: StepOutcome::NotAttempted,
            smoke: SmokeResult::default(),
            pass: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    None,
    AgentError,
    BuildError,
    SmokeError,
    Timeout,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::None => "none",
            FailureCategory::AgentError => "agent_error",
            FailureCategory::BuildError => "build_error",
            FailureCategory::SmokeError => "smoke_error",
            FailureCategory::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExistingOutput,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ExistingOutput => "existing_output",
        }
    }
}

/// One ledger row, written to `result.json` and appended to `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub batch_id: String,
    pub run_id: String,
    /// 1-based position in the matrix.
    pub index: usize,
    pub game_key: String,
    pub game_name: String,
    pub release_year: i32,
    pub provider_id: String,
    pub model_key: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_label: Option<String>,
    pub output_dir: PathBuf,
    pub artifact_dir: PathBuf,
    /// Where a prior output was moved before a forced regeneration.
    pub backup_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub skipped: bool,
    pub skip_reason: Option<SkipReason>,
    /// Hex SHA-256 of the rendered prompt; absent for skipped items.
    pub prompt_sha256: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub agent: Option<CommandRunResult>,
    pub validation: Option<ValidationSummary>,
    pub failure_category: FailureCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_run_never_succeeds() {
        let run = CommandRunResult {
            exit_code: Some(0),
            signal: None,
            timed_out: true,
            duration_ms: 10,
        };
        assert!(!run.succeeded());
        assert!(matches!(
            StepOutcome::from_run(run),
            StepOutcome::Failed { .. }
        ));
    }

    #[test]
    fn step_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::NotAttempted).expect("serialize");
        assert_eq!(json, serde_json::json!({ "status": "not_attempted" }));

        let passed = StepOutcome::from_run(CommandRunResult {
            exit_code: Some(0),
            signal: None,
            timed_out: false,
            duration_ms: 5,
        });
        let json = serde_json::to_value(&passed).expect("serialize");
        assert_eq!(json["status"], "passed");
        assert_eq!(json["run"]["exitCode"], 0);
    }

    #[test]
    fn failure_category_uses_snake_case() {
        let json = serde_json::to_string(&FailureCategory::SmokeError).expect("serialize");
        assert_eq!(json, "\"smoke_error\"");
        assert_eq!(FailureCategory::SmokeError.as_str(), "smoke_error");
    }

    #[test]
    fn command_display_joins_args() {
        let spec = CommandSpec::new("npm", ["run", "build"]);
        assert_eq!(spec.display(), "npm run build");
    }
}
