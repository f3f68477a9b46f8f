//! Pipeline executor
//!
//! Loads a pipeline, verifies the compiled catalog, selects a subgraph,
//! then walks the schedule one node at a time. The first failing `run` or
//! `verify` command stops the run; nothing after it executes.

use crate::evidence::{
    render_mermaid, write_json, EventKind, FailureContext, RunArtifacts, RunState, RunStatus,
    RunSummary, Stage, TraceEvent, TraceLog,
};
use crate::plan::{NodeState, Plan, Selection};
use crate::runner::{CommandRunner, ShellRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tdag_compile::Compiler;
use tdag_core::error::{DagError, Result};
use tdag_core::scenario::list_scenario_files;
use tdag_core::{clock, vcs, Pipeline, ProjectLayout};
use tracing::{debug, info, warn};

/// How a run should behave
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub selection: Selection,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selection: Selection::All,
            dry_run: false,
        }
    }
}

/// Result of a completed run loop
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub failure: Option<FailureContext>,
    pub summary: RunSummary,
    pub state_file: PathBuf,
    pub artifacts: RunArtifacts,
    pub execution_order: Vec<String>,
}

/// What [`Executor::run`] did
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// `--changed-only` found no changed files; nothing was written
    NoChanges,
    /// Selection came out empty; nothing was written
    NothingSelected,
    Completed(Box<RunReport>),
}

pub struct Executor {
    layout: ProjectLayout,
    runner: Arc<dyn CommandRunner>,
    workdir: PathBuf,
}

impl Executor {
    /// Executor that runs commands through bash in the project's VCS
    /// top-level (or the project root outside a repository)
    #[must_use]
    pub fn new(layout: ProjectLayout) -> Self {
        let workdir =
            vcs::toplevel(layout.project_root()).unwrap_or_else(|| layout.project_root().to_path_buf());
        Self {
            layout,
            runner: Arc::new(ShellRunner),
            workdir,
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    #[must_use]
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Execute `pipeline_file` under `options`
    ///
    /// Node failures are reported through [`RunReport::status`], not as
    /// errors.
    ///
    /// # Errors
    /// Returns usage, schema, topology and integrity errors detected before
    /// the run loop, plus IO errors writing evidence
    pub async fn run(&self, pipeline_file: &Path, options: &RunOptions) -> Result<RunOutcome> {
        if !pipeline_file.is_file() {
            return Err(DagError::usage(format!(
                "pipeline file not found: {}",
                pipeline_file.display()
            )));
        }
        let start_epoch = clock::epoch_seconds();
        let pipeline = Pipeline::load(pipeline_file)?;
        self.verify_integrity(&pipeline)?;

        let Some(plan) = self.select(&pipeline, &options.selection)? else {
            return Ok(RunOutcome::NoChanges);
        };
        let selected_count = plan.selected_count();
        if selected_count == 0 {
            return Ok(RunOutcome::NothingSelected);
        }
        info!(pipeline = %pipeline.pipeline_id, selected = selected_count, "starting run");

        let run_id = clock::local_run_id(chrono::Local::now());
        let artifacts = RunArtifacts::new(
            self.layout
                .evidence_root()
                .join(format!("{}-{run_id}", pipeline.pipeline_id)),
        );
        tokio::fs::create_dir_all(&artifacts.dir)
            .await
            .map_err(|e| DagError::io(&artifacts.dir, e))?;
        let trace = TraceLog::new(&artifacts.trace_file);

        let (only_node, changed_only) = match &options.selection {
            Selection::Only(id) => (Some(id.clone()), false),
            Selection::Changed { .. } => (None, true),
            Selection::All => (None, false),
        };
        trace
            .append(&TraceEvent::now(
                EventKind::RunStart,
                "",
                "pipeline",
                "info",
                format!(
                    "pipeline={} dry_run={} changed_only={changed_only} only_node={}",
                    pipeline.pipeline_id,
                    options.dry_run,
                    only_node.as_deref().unwrap_or("")
                ),
            ))
            .await?;

        let mut plan = plan;
        let (order, failure) = self.execute(&mut plan, &artifacts, &trace, options.dry_run).await?;
        let status = if failure.is_some() {
            RunStatus::Fail
        } else {
            RunStatus::Pass
        };

        tokio::fs::write(&artifacts.mermaid_file, render_mermaid(&plan))
            .await
            .map_err(|e| DagError::io(&artifacts.mermaid_file, e))?;

        let end_epoch = clock::epoch_seconds();
        let duration = end_epoch - start_epoch;
        trace
            .append(&TraceEvent::now(
                EventKind::RunEnd,
                "",
                "pipeline",
                status.as_str(),
                format!(
                    "duration_seconds={duration} selected={selected_count} processed={}",
                    order.len()
                ),
            ))
            .await?;

        let summary = RunSummary {
            pipeline_id: pipeline.pipeline_id.clone(),
            run_id,
            status,
            start_epoch_seconds: start_epoch,
            end_epoch_seconds: end_epoch,
            duration_seconds: duration,
            dry_run: options.dry_run,
            changed_only,
            only_node,
            selected_node_count: selected_count,
            processed_node_count: order.len(),
            failed_node: failure.as_ref().and_then(|f| f.node.clone()),
            failed_stage: failure.as_ref().map(|f| f.stage),
            failed_deps: failure.as_ref().map(|f| f.deps.clone()),
            trace_file: artifacts.trace_file.clone(),
            mermaid_file: artifacts.mermaid_file.clone(),
        };
        write_json(&artifacts.summary_file, &summary).await?;

        let state_file = self.layout.state_file();
        let state = RunState {
            summary: summary.clone(),
            pipeline_file: pipeline_file.to_path_buf(),
            run_summary_file: artifacts.summary_file.clone(),
            evidence_dir: artifacts.dir.clone(),
            execution_order: order.clone(),
        };
        write_json(&state_file, &state).await?;
        info!(status = %status, processed = order.len(), "run finished");

        Ok(RunOutcome::Completed(Box::new(RunReport {
            status,
            failure,
            summary,
            state_file,
            artifacts,
            execution_order: order,
        })))
    }

    /// Re-check compiled scenarios before anything runs
    ///
    /// Skipped for synthetic pipelines and when no compiled scenarios exist.
    fn verify_integrity(&self, pipeline: &Pipeline) -> Result<()> {
        if pipeline.is_synthetic() {
            return Ok(());
        }
        let compiled = self.layout.compiled_scenarios();
        if !compiled.is_dir() || list_scenario_files(&compiled)?.is_empty() {
            return Ok(());
        }
        let source = self.layout.source_scenarios();
        if !source.is_dir() {
            return Err(DagError::usage(format!(
                "scenario source directory missing: {}",
                source.display()
            )));
        }
        let report = Compiler::for_layout(&self.layout).check()?;
        debug!(files = report.files, "compiled scenarios verified");
        Ok(())
    }

    /// Build the plan; `None` means `--changed-only` saw no changes
    fn select(&self, pipeline: &Pipeline, selection: &Selection) -> Result<Option<Plan>> {
        let selection = match selection {
            Selection::Changed {
                files,
                include_global_gates,
            } if files.is_empty() => {
                let files = vcs::changed_files(&self.workdir);
                if files.is_empty() {
                    return Ok(None);
                }
                debug!(count = files.len(), "changed files from git status");
                Selection::Changed {
                    files,
                    include_global_gates: *include_global_gates,
                }
            }
            other => other.clone(),
        };
        let mut plan = Plan::new(pipeline);
        plan.select(&selection)?;
        Ok(Some(plan))
    }

    /// Walk the schedule; returns the processed order and any failure
    async fn execute(
        &self,
        plan: &mut Plan,
        artifacts: &RunArtifacts,
        trace: &TraceLog,
        dry_run: bool,
    ) -> Result<(Vec<String>, Option<FailureContext>)> {
        let schedule = plan.schedule();
        let mut order = Vec::with_capacity(schedule.order.len());

        for id in &schedule.order {
            let Some(node) = plan.get(id).map(|r| r.node.clone()) else {
                continue;
            };
            order.push(node.id.clone());
            let deps = node.deps_csv();

            if dry_run {
                println!("[DRY-RUN] node={} type={} deps={deps}", node.id, node.node_type);
                println!("  run: {}", node.run);
                println!("  verify: {}", node.verify);
                trace
                    .append(&TraceEvent::now(
                        EventKind::NodeDryRun,
                        &node.id,
                        "dry_run",
                        "pass",
                        format!("deps={deps}"),
                    ))
                    .await?;
                plan.set_state(&node.id, NodeState::Passed);
                continue;
            }

            println!("Running node: {} ({})", node.id, node.node_type);
            trace
                .append(&TraceEvent::now(
                    EventKind::NodeStart,
                    &node.id,
                    "run",
                    "info",
                    format!("deps={deps}"),
                ))
                .await?;

            for (stage, command) in [(Stage::Run, &node.run), (Stage::Verify, &node.verify)] {
                if !self.run_stage(&node.id, stage, command, artifacts, trace).await? {
                    plan.set_state(&node.id, NodeState::Failed);
                    return Ok((order, Some(FailureContext::node(&node.id, stage, deps))));
                }
            }
            plan.set_state(&node.id, NodeState::Passed);
        }

        if !schedule.is_complete() {
            warn!(unresolved = ?schedule.unresolved, "selected subgraph has unresolved dependencies");
            trace
                .append(&TraceEvent::now(
                    EventKind::RunFail,
                    "",
                    "topology",
                    "fail",
                    "cycle or unresolved dependency in selected subgraph",
                ))
                .await?;
            return Ok((order, Some(FailureContext::topology())));
        }
        Ok((order, None))
    }

    /// Run one stage command and log it; `false` on non-zero exit
    async fn run_stage(
        &self,
        node_id: &str,
        stage: Stage,
        command: &str,
        artifacts: &RunArtifacts,
        trace: &TraceLog,
    ) -> Result<bool> {
        let log_file = artifacts.log_file(node_id, stage);
        let output = self.runner.run(command, &self.workdir).await?;
        tokio::fs::write(&log_file, output.log_text(command))
            .await
            .map_err(|e| DagError::io(&log_file, e))?;

        let (kind, result) = if output.success() {
            (EventKind::NodePass, "pass")
        } else {
            (EventKind::NodeFail, "fail")
        };
        debug!(node = node_id, stage = %stage, code = output.code, "stage finished");
        trace
            .append(&TraceEvent::now(
                kind,
                node_id,
                stage.as_str(),
                result,
                format!("log={}", log_file.display()),
            ))
            .await?;
        Ok(output.success())
    }
}
