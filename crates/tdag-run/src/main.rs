use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tdag_core::config::{ProjectLayout, RuntimeRoot};
use tdag_core::logging;
use tdag_run::{Executor, RunOptions, RunOutcome, RunStatus, Selection, Stage};

fn cli() -> Command {
    Command::new("tdag-run")
        .version(tdag_core::VERSION)
        .about("Run a DAG pipeline with change-aware node selection")
        .arg(
            Arg::new("pipeline")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Pipeline file under <runtime-root>/dag/pipelines/"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print planned actions without running commands"),
        )
        .arg(
            Arg::new("changed-only")
                .long("changed-only")
                .action(ArgAction::SetTrue)
                .help("Run only nodes affected by changed files"),
        )
        .arg(
            Arg::new("changed-file")
                .long("changed-file")
                .action(ArgAction::Append)
                .help("Changed file (repeatable; default: git status)"),
        )
        .arg(
            Arg::new("include-global-gates")
                .long("include-global-gates")
                .action(ArgAction::SetTrue)
                .help("Let --changed-only reach smoke_gate and e2e_gate"),
        )
        .arg(
            Arg::new("only")
                .long("only")
                .help("Run exactly one node"),
        )
}

async fn run() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    let runtime_root = RuntimeRoot::from_env()?;

    let pipeline_arg = matches
        .get_one::<PathBuf>("pipeline")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing pipeline file"))?;
    let pipeline_file = std::env::current_dir()?.join(&pipeline_arg);
    let layout = ProjectLayout::from_pipeline_path(&pipeline_file, runtime_root)?;

    let selection = if let Some(id) = matches.get_one::<String>("only") {
        Selection::Only(id.clone())
    } else if matches.get_flag("changed-only") {
        Selection::Changed {
            files: matches
                .get_many::<String>("changed-file")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            include_global_gates: matches.get_flag("include-global-gates"),
        }
    } else {
        Selection::All
    };
    let options = RunOptions {
        selection,
        dry_run: matches.get_flag("dry-run"),
    };

    let report = match Executor::new(layout).run(&pipeline_file, &options).await? {
        RunOutcome::NoChanges => {
            println!("No changed files detected. --changed-only exits without execution.");
            return Ok(ExitCode::SUCCESS);
        }
        RunOutcome::NothingSelected => {
            println!("No nodes selected for execution.");
            return Ok(ExitCode::SUCCESS);
        }
        RunOutcome::Completed(report) => report,
    };

    if let Some(failure) = &report.failure {
        match (&failure.node, failure.stage) {
            (_, Stage::Topology) | (None, _) => {
                eprintln!("ERROR: cycle or unresolved dependency in selected subgraph");
            }
            (Some(node), _) => {
                println!("FAILED NODE: {node}");
                println!("Dependency context: deps={}", failure.deps);
                println!(
                    "Rerun command: tdag-run {} --only {node}",
                    pipeline_arg.display()
                );
            }
        }
    }
    if report.status == RunStatus::Fail {
        return Ok(ExitCode::FAILURE);
    }

    let summary = &report.summary;
    println!(
        "DAG run completed: pipeline={} status={}",
        summary.pipeline_id, summary.status
    );
    println!("State file: {}", report.state_file.display());
    println!("Run summary: {}", report.artifacts.summary_file.display());
    if !summary.dry_run {
        println!("Evidence dir: {}", report.artifacts.dir.display());
    }
    println!("Trace file: {}", summary.trace_file.display());
    println!("Mermaid DAG: {}", summary.mermaid_file.display());
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
