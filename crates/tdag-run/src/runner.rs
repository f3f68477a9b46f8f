//! Command execution for node `run`/`verify` stages

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tdag_core::error::{DagError, Result};

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; a signal-terminated child reports 1
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Log file body: `+ <command>` then stdout and stderr
    #[must_use]
    pub fn log_text(&self, command: &str) -> String {
        format!("+ {command}\n{}{}", self.stdout, self.stderr)
    }
}

/// Runs a node command to completion
///
/// A non-zero exit is a normal [`CommandOutput`]; only a failure to start
/// the command is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput>;
}

/// Runs commands through `bash -c`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        let output = tokio::process::Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| DagError::Spawn {
                program: "bash".to_string(),
                source,
            })?;
        Ok(CommandOutput {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn captures_both_streams_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let output = ShellRunner
            .run("echo out; echo err >&2; exit 4", dir.path())
            .await
            .unwrap();
        assert_eq!(output.code, 4);
        assert_eq!(output.log_text("x"), "+ x\nout\nerr\n");
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let output = ShellRunner.run("cat marker", dir.path()).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "here");
    }

    #[tokio::test]
    async fn signal_counts_as_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        let output = ShellRunner.run("kill -9 $$", dir.path()).await.unwrap();
        assert_eq!(output.code, 1);
    }
}
