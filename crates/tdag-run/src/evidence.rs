//! Run evidence: trace log, run summary, last-run state and Mermaid graph
//!
//! Everything lands in one run-scoped directory. The trace is appended as
//! the run progresses; summary, state and graph are written once after the
//! run loop ends.

use crate::plan::Plan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tdag_core::clock;
use tdag_core::error::{DagError, Result};
use tokio::io::AsyncWriteExt;

pub const TRACE_FILE: &str = "trace.jsonl";
pub const SUMMARY_FILE: &str = "run-summary.json";
pub const MERMAID_FILE: &str = "dag.mmd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStart,
    NodeStart,
    NodePass,
    NodeFail,
    NodeDryRun,
    RunFail,
    RunEnd,
}

/// Terminal pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pass,
    Fail,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage at which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Run,
    Verify,
    Topology,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Verify => "verify",
            Self::Topology => "topology",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run failed
///
/// `node` is `None` for topology failures, which have no single culprit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub node: Option<String>,
    pub stage: Stage,
    /// Raw comma-separated dependency list of the failing node
    pub deps: String,
}

impl FailureContext {
    #[must_use]
    pub fn node(id: impl Into<String>, stage: Stage, deps: impl Into<String>) -> Self {
        Self {
            node: Some(id.into()),
            stage,
            deps: deps.into(),
        }
    }

    #[must_use]
    pub fn topology() -> Self {
        Self {
            node: None,
            stage: Stage::Topology,
            deps: "unresolved indegree".to_string(),
        }
    }
}

/// One line of `trace.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub ts: String,
    pub event: EventKind,
    pub node: String,
    pub stage: String,
    pub result: String,
    pub message: String,
}

impl TraceEvent {
    /// Event stamped with the current UTC time
    pub fn now(
        event: EventKind,
        node: impl Into<String>,
        stage: impl Into<String>,
        result: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts: clock::now_utc_iso(),
            event,
            node: node.into(),
            stage: stage.into(),
            result: result.into(),
            message: message.into(),
        }
    }
}

/// Append-only JSON-lines trace
#[derive(Debug, Clone)]
pub struct TraceLog {
    path: PathBuf,
}

impl TraceLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns an IO error if the trace file cannot be appended to
    pub async fn append(&self, event: &TraceEvent) -> Result<()> {
        let mut line = serde_json::to_string(event).map_err(|e| DagError::io(&self.path, e.into()))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DagError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DagError::io(&self.path, e))?;
        file.flush().await.map_err(|e| DagError::io(&self.path, e))
    }

    /// Parse every event back; used by tests and tooling
    ///
    /// # Errors
    /// Returns an IO error if the file is unreadable or a line is not a
    /// trace event
    pub async fn read_all(&self) -> Result<Vec<TraceEvent>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DagError::io(&self.path, e))?;
        text.lines()
            .map(|line| serde_json::from_str(line).map_err(|e| DagError::io(&self.path, e.into())))
            .collect()
    }
}

/// File locations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub dir: PathBuf,
    pub trace_file: PathBuf,
    pub summary_file: PathBuf,
    pub mermaid_file: PathBuf,
}

impl RunArtifacts {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            trace_file: dir.join(TRACE_FILE),
            summary_file: dir.join(SUMMARY_FILE),
            mermaid_file: dir.join(MERMAID_FILE),
            dir,
        }
    }

    /// `<node>-<stage>.log`
    #[must_use]
    pub fn log_file(&self, node: &str, stage: Stage) -> PathBuf {
        self.dir.join(format!("{node}-{stage}.log"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pipeline_id: String,
    pub run_id: String,
    pub status: RunStatus,
    pub start_epoch_seconds: i64,
    pub end_epoch_seconds: i64,
    pub duration_seconds: i64,
    pub dry_run: bool,
    pub changed_only: bool,
    pub only_node: Option<String>,
    pub selected_node_count: usize,
    pub processed_node_count: usize,
    pub failed_node: Option<String>,
    pub failed_stage: Option<Stage>,
    pub failed_deps: Option<String>,
    pub trace_file: PathBuf,
    pub mermaid_file: PathBuf,
}

/// Persisted `last-run.json`: the summary plus pointers for downstream tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub pipeline_file: PathBuf,
    pub run_summary_file: PathBuf,
    pub evidence_dir: PathBuf,
    pub execution_order: Vec<String>,
}

/// Write pretty JSON with a trailing newline, creating parent directories
///
/// # Errors
/// Returns an IO error if the file or its parent cannot be written
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| DagError::io(path, e.into()))?;
    text.push('\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DagError::io(parent, e))?;
    }
    tokio::fs::write(path, text)
        .await
        .map_err(|e| DagError::io(path, e))
}

/// Mermaid `graph TD` of the selected subgraph
///
/// Node handles are `n<index>` with the index taken from definition order,
/// so handles stay stable across selections of the same pipeline.
#[must_use]
pub fn render_mermaid(plan: &Plan) -> String {
    let mut lines = vec!["graph TD".to_string()];
    let selected: Vec<(usize, &tdag_core::PipelineNode)> = plan
        .records()
        .enumerate()
        .filter(|(_, r)| r.state.is_selected())
        .map(|(i, r)| (i, &r.node))
        .collect();
    for (index, node) in &selected {
        let label = format!("{} ({})", node.id, node.node_type).replace('"', "\\\"");
        lines.push(format!("  n{index}[\"{label}\"]"));
    }
    for (index, node) in &selected {
        for dep in &node.deps {
            let Some(record) = plan.get(dep) else { continue };
            if !record.state.is_selected() {
                continue;
            }
            if let Some(dep_index) = plan.index_of(dep) {
                lines.push(format!("  n{dep_index} --> n{index}"));
            }
        }
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
