use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tdag_compile::Compiler;
use tdag_core::config::{RuntimeRoot, DEFAULT_SOURCE_DIR};
use tdag_core::{logging, vcs};

fn cli() -> Command {
    Command::new("tdag-compile")
        .version(tdag_core::VERSION)
        .about("Compile source scenarios into hash-verified runtime copies")
        .arg(
            Arg::new("project-root")
                .long("project-root")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Project root (default: git top-level, else current directory)"),
        )
        .arg(
            Arg::new("source")
                .long("source")
                .default_value(DEFAULT_SOURCE_DIR)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Source scenario directory"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Compiled scenario directory (default: <runtime-root>/dag/scenarios)"),
        )
        .arg(
            Arg::new("check-only")
                .long("check-only")
                .action(ArgAction::SetTrue)
                .help("Verify the existing manifest without recompiling"),
        )
}

fn run() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    let runtime_root = RuntimeRoot::from_env()?;

    let cwd = std::env::current_dir()?;
    let project_root = vcs::resolve_project_root(
        matches.get_one::<PathBuf>("project-root").map(PathBuf::as_path),
        &cwd,
    );
    let source = matches
        .get_one::<PathBuf>("source")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR));
    let out = matches
        .get_one::<PathBuf>("out")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(runtime_root.posix()).join("dag/scenarios"));
    let compiler = Compiler::new(project_root, source, out);

    if matches.get_flag("check-only") {
        let report = compiler.check()?;
        println!(
            "DAG compile check passed: source={} runtime={} files={}",
            report.source_dir.display(),
            report.out_dir.display(),
            report.files
        );
    } else {
        let report = compiler.compile()?;
        println!(
            "DAG compile check passed: source={} runtime={} files={}",
            report.check.source_dir.display(),
            report.check.out_dir.display(),
            report.check.files
        );
        println!(
            "DAG scenarios compiled: source={} runtime={}",
            compiler.source_dir().display(),
            compiler.out_dir().display()
        );
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
