use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tdag_build::{BuildOptions, Generator};
use tdag_core::config::{ProjectLayout, RuntimeRoot};
use tdag_core::{logging, vcs};

fn cli() -> Command {
    Command::new("tdag-build")
        .version(tdag_core::VERSION)
        .about("Expand the scenario catalog into a DAG pipeline")
        .arg(
            Arg::new("from")
                .long("from")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Scenario directory (default: <runtime-root>/dag/scenarios)"),
        )
        .arg(
            Arg::new("source")
                .long("source")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Source scenario directory used for auto-compile"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Pipeline file (default: <runtime-root>/dag/pipelines/default.pipeline.yml)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the pipeline instead of writing it"),
        )
        .arg(
            Arg::new("synthetic-nodes")
                .long("synthetic-nodes")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Generate a synthetic chain of N nodes"),
        )
        .arg(
            Arg::new("no-compile")
                .long("no-compile")
                .action(ArgAction::SetTrue)
                .help("Skip the automatic scenario compile"),
        )
        .arg(
            Arg::new("enforce-layer-guard")
                .long("enforce-layer-guard")
                .action(ArgAction::SetTrue)
                .help("Run the change-impact layer guard before expanding"),
        )
        .arg(
            Arg::new("changed-file")
                .long("changed-file")
                .action(ArgAction::Append)
                .help("Changed file passed to the layer guard (repeatable)"),
        )
}

fn run() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    let runtime_root = RuntimeRoot::from_env()?;
    let cwd = std::env::current_dir()?;
    let layout = ProjectLayout::new(vcs::resolve_project_root(None, &cwd), runtime_root);

    let options = BuildOptions {
        scenario_dir: matches.get_one::<PathBuf>("from").cloned(),
        source_dir: matches.get_one::<PathBuf>("source").cloned(),
        out_file: matches.get_one::<PathBuf>("out").cloned(),
        dry_run: matches.get_flag("dry-run"),
        synthetic_nodes: matches.get_one::<i64>("synthetic-nodes").copied(),
        no_compile: matches.get_flag("no-compile"),
        enforce_layer_guard: matches.get_flag("enforce-layer-guard"),
        changed_files: matches
            .get_many::<String>("changed-file")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    };

    let generated = Generator::new(layout).generate(&options)?;
    match (&generated.written, options.synthetic_nodes) {
        (None, _) => print!("{}", generated.text),
        (Some(path), Some(count)) => println!(
            "Synthetic pipeline generated: {} (nodes={count})",
            path.display()
        ),
        (Some(path), None) => println!("Pipeline generated: {}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    logging::init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
