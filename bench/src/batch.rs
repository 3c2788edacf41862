//! Batch orchestration: one strictly sequential pass over the matrix.
//!
//! Item N+1 starts only after item N's agent run, validation, and result.json
//! are complete. The filesystem is the only shared state, and sequential
//! execution is what keeps it consistent without locks.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::agents::{AgentCli, CommandOptions};
use crate::core::classify::determine_failure_category;
use crate::core::matrix::{MatrixFilters, resolve_matrix};
use crate::core::slug::output_dir_name;
use crate::core::types::{FailureCategory, MatrixItem, RunResult, SkipReason};
use crate::exit_codes;
use crate::io::config::HarnessConfig;
use crate::io::output::{OutputAction, backup_path, prepare_output_dir};
use crate::io::preflight::ensure_binaries;
use crate::io::process::{DEFAULT_KILL_GRACE, ProcessRequest, run_process};
use crate::io::prompt::{PromptVars, prompt_sha256, render_prompt};
use crate::io::record::{
    ArtifactPaths, Tally, batch_dir, generate_batch_id, run_id, write_json, write_result,
    write_summary, write_text,
};
use crate::validate::{ValidationConfig, run_validation};

/// Everything one invocation needs, after CLI overrides are applied.
#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub config: &'a HarnessConfig,
    /// Prompt template contents.
    pub template: &'a str,
    pub filters: MatrixFilters,
    pub force: bool,
    pub dry_run: bool,
    /// Budget for the agent run and for each validation step.
    pub timeout: Duration,
    pub kill_grace: Duration,
}

impl<'a> BatchRequest<'a> {
    pub fn new(config: &'a HarnessConfig, template: &'a str, filters: MatrixFilters) -> Self {
        Self {
            config,
            template,
            filters,
            force: false,
            dry_run: false,
            timeout: config.defaults.timeout(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Result of a finished batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub batch_dir: PathBuf,
    pub summary_path: PathBuf,
    pub results: Vec<RunResult>,
    pub tally: Tally,
    pub exit_code: i32,
}

/// A matrix item with its output location and lifecycle decision.
#[derive(Debug, Clone)]
struct PlannedItem {
    item: MatrixItem,
    cli: AgentCli,
    dir_name: String,
    output_dir: PathBuf,
    action: OutputAction,
}

/// Process exit code for a set of results.
pub fn batch_exit_code(results: &[RunResult], dry_run: bool) -> i32 {
    if dry_run
        || results
            .iter()
            .all(|result| result.failure_category == FailureCategory::None)
    {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    }
}

/// Resolve, preflight, and run every matrix item in order.
///
/// Environment problems (bad filters, missing binaries, spawn failures,
/// filesystem errors) abort the batch with `Err`. Agent and build failures are
/// recorded per item and never abort.
#[instrument(skip_all, fields(force = request.force, dry_run = request.dry_run))]
pub fn run_batch(request: &BatchRequest<'_>) -> Result<BatchOutcome> {
    let config = request.config;
    let defaults = &config.defaults;
    config.validate().context("invalid config")?;

    for entry in request.filters.unmatched(&config.games, &config.providers) {
        warn!(filter = %entry, "filter entry matches nothing");
    }
    let items = resolve_matrix(&config.games, &config.providers, &request.filters)?;
    let plan = plan_items(items, &defaults.output_base_dir, request.force)?;
    info!(items = plan.len(), "matrix resolved");

    if !request.dry_run {
        let mut binaries: Vec<&str> = plan
            .iter()
            .filter(|planned| planned.action != OutputAction::Skip)
            .map(|planned| planned.item.binary.as_str())
            .collect();
        if !binaries.is_empty() {
            binaries.extend(defaults.install_command.first().map(String::as_str));
            binaries.extend(defaults.build_command.first().map(String::as_str));
        }
        ensure_binaries(binaries)?;
    }

    let batch_id = generate_batch_id();
    let batch_dir = batch_dir(&defaults.runs_base_dir, &batch_id);
    std::fs::create_dir_all(&batch_dir)
        .with_context(|| format!("create batch dir {}", batch_dir.display()))?;
    info!(batch_id = %batch_id, batch_dir = %batch_dir.display(), "batch started");

    let ctx = ItemContext {
        request,
        batch_id: &batch_id,
        batch_dir: &batch_dir,
        validation: ValidationConfig {
            kill_grace: request.kill_grace,
            ..ValidationConfig::new(
                defaults.install_command.clone(),
                defaults.build_command.clone(),
                request.timeout,
            )
        },
    };

    let total = plan.len();
    let mut results: Vec<RunResult> = Vec::with_capacity(total);
    let mut summary_path = write_summary(&batch_dir, &results)?;
    for (offset, planned) in plan.iter().enumerate() {
        let index = offset + 1;
        print!("[{index}/{total}] {} ", planned.item.label());
        std::io::stdout().flush().ok();

        let result = ctx.run_item(index, planned)?;
        write_result(&ArtifactPaths::new(&batch_dir, &result.run_id), &result)?;
        println!("{}", status_text(&result));

        results.push(result);
        summary_path = write_summary(&batch_dir, &results)?;
    }

    let tally = Tally::from_results(&results);
    let exit_code = batch_exit_code(&results, request.dry_run);
    info!(
        success = tally.success,
        failed = tally.failed,
        skipped = tally.skipped,
        exit_code,
        "batch finished"
    );
    Ok(BatchOutcome {
        batch_id,
        batch_dir,
        summary_path,
        results,
        tally,
        exit_code,
    })
}

fn plan_items(items: Vec<MatrixItem>, output_base: &Path, force: bool) -> Result<Vec<PlannedItem>> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let mut plan = Vec::with_capacity(items.len());
    for item in items {
        let cli = AgentCli::from_provider_id(&item.provider_id)?;
        let dir_name = output_dir_name(&item.provider_id, &item.model.key, &item.game.key);
        if let Some(previous) = seen.insert(dir_name.clone(), item.label()) {
            bail!(
                "output directory {dir_name} is shared by {previous} and {}",
                item.label()
            );
        }
        let output_dir = output_base.join(&dir_name);
        let action = OutputAction::for_dir(&output_dir, force);
        debug!(item = %item.label(), action = ?action, "item planned");
        plan.push(PlannedItem {
            item,
            cli,
            dir_name,
            output_dir,
            action,
        });
    }
    Ok(plan)
}

fn status_text(result: &RunResult) -> String {
    if let Some(reason) = result.skip_reason {
        return format!("skipped ({})", reason.as_str());
    }
    if result.dry_run {
        return format!("{} (dry run)", result.failure_category.as_str());
    }
    result.failure_category.as_str().to_string()
}

struct ItemContext<'a> {
    request: &'a BatchRequest<'a>,
    batch_id: &'a str,
    batch_dir: &'a Path,
    validation: ValidationConfig,
}

impl ItemContext<'_> {
    #[instrument(skip_all, fields(index = index, item = %planned.item.label()))]
    fn run_item(&self, index: usize, planned: &PlannedItem) -> Result<RunResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let item = &planned.item;
        let run_id = run_id(index, &planned.dir_name);
        let artifacts = ArtifactPaths::new(self.batch_dir, &run_id);
        artifacts.create()?;

        let mut result = RunResult {
            batch_id: self.batch_id.to_string(),
            run_id,
            index,
            game_key: item.game.key.clone(),
            game_name: item.game.name.clone(),
            release_year: item.game.release_year,
            provider_id: item.provider_id.clone(),
            model_key: item.model.key.clone(),
            model_id: item.model.id.clone(),
            model_label: item.model.label.clone(),
            output_dir: planned.output_dir.clone(),
            artifact_dir: artifacts.dir.clone(),
            backup_dir: None,
            dry_run: self.request.dry_run,
            skipped: false,
            skip_reason: None,
            prompt_sha256: None,
            started_at: started_at.to_rfc3339(),
            finished_at: String::new(),
            duration_ms: 0,
            agent: None,
            validation: None,
            failure_category: FailureCategory::None,
        };

        if planned.action == OutputAction::Skip {
            info!(output_dir = %planned.output_dir.display(), "output exists, skipping");
            result.skipped = true;
            result.skip_reason = Some(SkipReason::ExistingOutput);
            return Ok(finish(result, clock));
        }

        let defaults = &self.request.config.defaults;
        let prompt = render_prompt(
            self.request.template,
            &PromptVars::for_item(item, &planned.output_dir),
        );
        write_text(&artifacts.prompt(), &prompt)?;
        result.prompt_sha256 = Some(prompt_sha256(&prompt));

        let options = CommandOptions {
            output_dir: planned.output_dir.clone(),
            gemini_settings_path: defaults.gemini_settings_path.clone(),
        };
        let spec = planned.cli.build_command(item, &prompt, &options);
        write_json(&artifacts.command(), &spec)?;

        if self.request.dry_run {
            debug!("dry run, agent not started");
            return Ok(finish(result, clock));
        }

        let backup = backup_path(&defaults.backup_base_dir, &planned.dir_name, self.batch_id);
        result.backup_dir = prepare_output_dir(&planned.output_dir, &backup, planned.action)?;

        info!(command = %spec.command, "agent started");
        let agent_request = ProcessRequest::new(spec, self.request.timeout)
            .with_logs(artifacts.agent_stdout(), artifacts.agent_stderr(), false)
            .with_kill_grace(self.request.kill_grace);
        let agent = run_process(&agent_request)?;
        if agent.timed_out {
            warn!(duration_ms = agent.duration_ms, "agent timed out");
        }

        let validation = run_validation(&planned.output_dir, &artifacts, &self.validation)?;
        write_json(&artifacts.validation(), &validation)?;

        result.failure_category = determine_failure_category(Some(&agent), Some(&validation));
        result.agent = Some(agent);
        result.validation = Some(validation);
        Ok(finish(result, clock))
    }
}

fn finish(mut result: RunResult, clock: Instant) -> RunResult {
    result.finished_at = Utc::now().to_rfc3339();
    result.duration_ms = clock.elapsed().as_millis() as u64;
    result
}
