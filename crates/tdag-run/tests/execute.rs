//! Executor runs against scripted command outcomes

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tdag_core::error::Result;
use tdag_core::pipeline::node_type;
use tdag_core::{Pipeline, PipelineNode};
use tdag_run::evidence::{EventKind, TraceLog};
use tdag_run::{
    CommandOutput, CommandRunner, Executor, RunOptions, RunOutcome, RunReport, RunState,
    RunStatus, Selection, Stage,
};
use tdag_test_utils::TestProject;

/// Succeeds unless the command is listed as failing; records every call
#[derive(Default)]
struct ScriptedRunner {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn failing(commands: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: commands.iter().map(|c| (*c).to_string()).collect(),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, _cwd: &Path) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.to_string());
        Ok(CommandOutput {
            code: i32::from(self.failing.contains(command)),
            stdout: format!("ran {command}\n"),
            stderr: String::new(),
        })
    }
}

fn node(id: &str, deps: &[&str], globs: &[&str]) -> PipelineNode {
    let run = format!("run-{id}");
    let verify = format!("verify-{id}");
    let node = PipelineNode::new(id, node_type::UTILITY, run, verify).with_deps(deps.iter().copied());
    if globs.is_empty() {
        node
    } else {
        node.with_changed_paths(globs.iter().copied())
    }
}

fn gated_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new("gated");
    for n in [
        node("preflight", &[], &["never/**"]),
        node("a", &["preflight"], &["src/a/**"]),
        node("b", &["a"], &["src/b/**"]),
        node("c", &["preflight"], &["src/c/**"]),
        PipelineNode::new("smoke_gate", node_type::SMOKE, "run-smoke", "verify-smoke")
            .with_deps(["b", "c"])
            .with_changed_paths(["never/**"]),
        PipelineNode::new("e2e_gate", node_type::E2E, "run-e2e", "verify-e2e")
            .with_deps(["smoke_gate"])
            .with_changed_paths(["never/**"]),
    ] {
        pipeline.push(n);
    }
    pipeline
}

fn setup(pipeline: &Pipeline, runner: Arc<ScriptedRunner>) -> (TestProject, Executor, PathBuf) {
    let project = TestProject::new();
    let file = project.write_pipeline("test.pipeline.yml", &pipeline.render());
    let executor = Executor::new(project.layout().clone())
        .with_workdir(project.root())
        .with_runner(runner);
    (project, executor, file)
}

async fn completed(executor: &Executor, file: &Path, options: &RunOptions) -> RunReport {
    match executor.run(file, options).await.unwrap() {
        RunOutcome::Completed(report) => *report,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

fn changed(files: &[&str], gates: bool) -> RunOptions {
    RunOptions {
        selection: Selection::Changed {
            files: files.iter().map(|f| (*f).to_string()).collect(),
            include_global_gates: gates,
        },
        dry_run: false,
    }
}

#[tokio::test]
async fn run_failure_stops_dependents() {
    let mut pipeline = Pipeline::new("chain");
    pipeline.push(node("A", &[], &[]));
    pipeline.push(node("B", &["A"], &[]));
    let runner = ScriptedRunner::failing(&["run-A"]);
    let (_project, executor, file) = setup(&pipeline, runner.clone());

    let report = completed(&executor, &file, &RunOptions::default()).await;
    assert_eq!(report.status, RunStatus::Fail);
    let failure = report.failure.clone().unwrap();
    assert_eq!(failure.node.as_deref(), Some("A"));
    assert_eq!(failure.stage, Stage::Run);
    assert_eq!(runner.calls(), vec!["run-A"]);
    assert_eq!(report.execution_order, vec!["A"]);

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.artifacts.summary_file).unwrap())
            .unwrap();
    assert_eq!(summary["failed_node"], "A");
    assert_eq!(summary["failed_stage"], "run");
    assert_eq!(summary["processed_node_count"], 1);
    assert!(report.artifacts.dir.join("A-run.log").is_file());
    assert!(!report.artifacts.dir.join("A-verify.log").exists());
    assert!(!report.artifacts.dir.join("B-run.log").exists());
}

#[tokio::test]
async fn verify_failure_reports_verify_stage() {
    let mut pipeline = Pipeline::new("chain");
    pipeline.push(node("A", &[], &[]));
    pipeline.push(node("B", &["A"], &[]));
    let runner = ScriptedRunner::failing(&["verify-A"]);
    let (_project, executor, file) = setup(&pipeline, runner.clone());

    let report = completed(&executor, &file, &RunOptions::default()).await;
    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::Verify);
    assert_eq!(failure.deps, "");
    assert_eq!(runner.calls(), vec!["run-A", "verify-A"]);

    let run_log = std::fs::read_to_string(report.artifacts.dir.join("A-run.log")).unwrap();
    assert_eq!(run_log, "+ run-A\nran run-A\n");
}

#[tokio::test]
async fn passing_run_writes_every_artifact() {
    let pipeline = gated_pipeline();
    let runner = ScriptedRunner::failing(&[]);
    let (project, executor, file) = setup(&pipeline, runner.clone());

    let report = completed(&executor, &file, &RunOptions::default()).await;
    assert_eq!(report.status, RunStatus::Pass);
    assert_eq!(
        report.execution_order,
        vec!["preflight", "a", "b", "c", "smoke_gate", "e2e_gate"]
    );
    assert_eq!(runner.calls().len(), 12);

    let events = TraceLog::new(&report.artifacts.trace_file).read_all().await.unwrap();
    assert_eq!(events.first().unwrap().event, EventKind::RunStart);
    assert_eq!(events.last().unwrap().event, EventKind::RunEnd);
    assert_eq!(events.last().unwrap().result, "PASS");
    assert_eq!(
        events.iter().filter(|e| e.event == EventKind::NodePass).count(),
        12
    );

    let state: RunState =
        serde_json::from_str(&project.read(project.layout().state_file())).unwrap();
    assert_eq!(state.execution_order, report.execution_order);
    assert_eq!(state.summary.status, RunStatus::Pass);
    assert_eq!(state.evidence_dir, report.artifacts.dir);
    assert!(report
        .artifacts
        .dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("gated-"));

    let mermaid = std::fs::read_to_string(&report.artifacts.mermaid_file).unwrap();
    assert!(mermaid.starts_with("graph TD\n  n0[\"preflight (utility)\"]\n"));
    assert!(mermaid.contains("  n4 --> n5\n"));
}

#[tokio::test]
async fn each_stage_logs_its_own_command() {
    let pipeline = gated_pipeline();
    let (_project, executor, file) = setup(&pipeline, ScriptedRunner::failing(&[]));

    let report = completed(&executor, &file, &RunOptions::default()).await;
    let dir = &report.artifacts.dir;
    assert_eq!(
        std::fs::read_to_string(dir.join("b-run.log")).unwrap(),
        "+ run-b\nran run-b\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("b-verify.log")).unwrap(),
        "+ verify-b\nran verify-b\n"
    );
}

#[tokio::test]
async fn changed_only_excludes_gates_by_default() {
    let runner = ScriptedRunner::failing(&[]);
    let (_project, executor, file) = setup(&gated_pipeline(), runner);
    let report = completed(&executor, &file, &changed(&["src/a/lib.rs"], false)).await;
    assert_eq!(report.execution_order, vec!["preflight", "a", "b"]);
    assert!(report.summary.changed_only);
}

#[tokio::test]
async fn changed_only_can_include_gates() {
    let runner = ScriptedRunner::failing(&[]);
    let (_project, executor, file) = setup(&gated_pipeline(), runner);
    let report = completed(&executor, &file, &changed(&["src/a/lib.rs"], true)).await;
    // c only joins through the backward closure of smoke_gate.
    assert_eq!(
        report.execution_order,
        vec!["preflight", "a", "b", "c", "smoke_gate", "e2e_gate"]
    );
}

#[tokio::test]
async fn unmatched_changes_select_nothing() {
    let runner = ScriptedRunner::failing(&[]);
    let (project, executor, file) = setup(&gated_pipeline(), runner.clone());
    let outcome = executor.run(&file, &changed(&["README.md"], false)).await.unwrap();
    assert!(matches!(outcome, RunOutcome::NothingSelected));
    assert!(runner.calls().is_empty());
    assert!(!project.layout().state_file().exists());
}

#[tokio::test]
async fn changed_only_without_changes_is_a_no_op() {
    let runner = ScriptedRunner::failing(&[]);
    let (project, executor, file) = setup(&gated_pipeline(), runner);
    // The temp project is not a git repository, so git reports nothing.
    let outcome = executor.run(&file, &changed(&[], false)).await.unwrap();
    assert!(matches!(outcome, RunOutcome::NoChanges));
    assert!(!project.layout().evidence_root().exists());
}

#[tokio::test]
async fn only_runs_a_single_node() {
    let runner = ScriptedRunner::failing(&[]);
    let (_project, executor, file) = setup(&gated_pipeline(), runner.clone());
    let options = RunOptions {
        selection: Selection::Only("b".into()),
        dry_run: false,
    };
    let report = completed(&executor, &file, &options).await;
    assert_eq!(report.execution_order, vec!["b"]);
    assert_eq!(runner.calls(), vec!["run-b", "verify-b"]);
    assert_eq!(report.summary.only_node.as_deref(), Some("b"));

    let missing = RunOptions {
        selection: Selection::Only("ghost".into()),
        dry_run: false,
    };
    let err = executor.run(&file, &missing).await.unwrap_err();
    assert!(err.to_string().contains("--only node not found: ghost"));
}

#[tokio::test]
async fn cycle_is_a_topology_failure() {
    let text = "\
version: 1
pipeline_id: cyclic
nodes:
  - id: ok
    type: utility
    deps: \"\"
    run: \"run-ok\"
    verify: \"verify-ok\"
  - id: p
    type: utility
    deps: \"q\"
    run: \"run-p\"
    verify: \"verify-p\"
  - id: q
    type: utility
    deps: \"p\"
    run: \"run-q\"
    verify: \"verify-q\"
";
    let project = TestProject::new();
    let file = project.write_pipeline("cyclic.pipeline.yml", text);
    let runner = ScriptedRunner::failing(&[]);
    let executor = Executor::new(project.layout().clone())
        .with_workdir(project.root())
        .with_runner(runner.clone());

    let report = completed(&executor, &file, &RunOptions::default()).await;
    assert_eq!(report.status, RunStatus::Fail);
    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::Topology);
    assert_eq!(failure.node, None);
    assert_eq!(failure.deps, "unresolved indegree");
    assert_eq!(runner.calls(), vec!["run-ok", "verify-ok"]);

    let events = TraceLog::new(&report.artifacts.trace_file).read_all().await.unwrap();
    let run_fail = events.iter().find(|e| e.event == EventKind::RunFail).unwrap();
    assert_eq!(run_fail.stage, "topology");
    assert_eq!(report.summary.failed_node, None);
    assert_eq!(report.summary.failed_stage, Some(Stage::Topology));
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let runner = ScriptedRunner::failing(&[]);
    let (_project, executor, file) = setup(&gated_pipeline(), runner.clone());
    let options = RunOptions {
        selection: Selection::All,
        dry_run: true,
    };
    let report = completed(&executor, &file, &options).await;
    assert_eq!(report.status, RunStatus::Pass);
    assert!(runner.calls().is_empty());
    assert!(report.summary.dry_run);
    assert_eq!(report.summary.processed_node_count, 6);

    let events = TraceLog::new(&report.artifacts.trace_file).read_all().await.unwrap();
    let dry: Vec<&str> = events
        .iter()
        .filter(|e| e.event == EventKind::NodeDryRun)
        .map(|e| e.node.as_str())
        .collect();
    assert_eq!(dry, vec!["preflight", "a", "b", "c", "smoke_gate", "e2e_gate"]);
}

#[tokio::test]
async fn missing_pipeline_file_is_usage_error() {
    let project = TestProject::new();
    let executor = Executor::new(project.layout().clone()).with_workdir(project.root());
    let missing = project.layout().pipelines_dir().join("absent.pipeline.yml");
    let err = executor.run(&missing, &RunOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), tdag_core::ErrorKind::Usage);
}
