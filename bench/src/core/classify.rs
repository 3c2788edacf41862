//! Failure classification for a finished run.

use crate::core::types::{CommandRunResult, FailureCategory, ValidationSummary};

/// Derive the single failure category for a run.
///
/// Precedence: agent timeout, agent failure, missing validation, install/build
/// failure, smoke failure. A timed-out agent is `Timeout` whatever its exit code.
pub fn determine_failure_category(
    agent: Option<&CommandRunResult>,
    validation: Option<&ValidationSummary>,
) -> FailureCategory {
    let Some(agent) = agent else {
        return FailureCategory::AgentError;
    };
    if agent.timed_out {
        return FailureCategory::Timeout;
    }
    if agent.exit_code != Some(0) {
        return FailureCategory::AgentError;
    }
    let Some(validation) = validation else {
        return FailureCategory::BuildError;
    };
    if !validation.install.passed() || !validation.build.passed() {
        return FailureCategory::BuildError;
    }
    if !validation.smoke.pass {
        return FailureCategory::SmokeError;
    }
    FailureCategory::None
}
