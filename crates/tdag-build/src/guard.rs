//! External change-impact layer guard
//!
//! The guard is a collaborator script; the generator only invokes it and
//! aborts when it is missing or exits non-zero.

use std::path::{Path, PathBuf};
use std::process::Command;
use tdag_core::config::{RuntimeRoot, RUNTIME_ROOT_ENV};
use tdag_core::error::{DagError, Result};
use tracing::info;

/// Override for the guard script path
pub const LAYER_GUARD_ENV: &str = "TDAG_LAYER_GUARD";

/// Project-relative default guard script
pub const DEFAULT_LAYER_GUARD: &str = "scripts/change_impact_gate.sh";

#[derive(Debug, Clone)]
pub struct LayerGuard {
    script: PathBuf,
    project_root: PathBuf,
    runtime_root: RuntimeRoot,
}

impl LayerGuard {
    pub fn new(
        script: impl AsRef<Path>,
        project_root: impl Into<PathBuf>,
        runtime_root: RuntimeRoot,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            script: project_root.join(script),
            project_root,
            runtime_root,
        }
    }

    /// Guard named by [`LAYER_GUARD_ENV`], else [`DEFAULT_LAYER_GUARD`]
    pub fn from_env(project_root: impl Into<PathBuf>, runtime_root: RuntimeRoot) -> Self {
        let script = std::env::var(LAYER_GUARD_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LAYER_GUARD.to_string());
        Self::new(script, project_root, runtime_root)
    }

    #[must_use]
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Run the guard over `changed_files`
    ///
    /// # Errors
    /// Returns a usage error if the script is missing, [`DagError::Spawn`]
    /// if bash cannot start, and [`DagError::External`] on non-zero exit
    pub fn enforce(&self, changed_files: &[String]) -> Result<()> {
        if !self.script.is_file() {
            return Err(DagError::usage(format!(
                "change impact gate script not found: {}",
                self.script.display()
            )));
        }
        let mut command = Command::new("bash");
        command
            .arg(&self.script)
            .arg("--project-root")
            .arg(&self.project_root)
            .args(["--format", "text", "--enforce-layer-guard"])
            .current_dir(&self.project_root)
            .env(RUNTIME_ROOT_ENV, self.runtime_root.as_str());
        for changed in changed_files {
            command.arg("--changed-file").arg(changed);
        }

        let output = command.output().map_err(|source| DagError::Spawn {
            program: self.script.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(DagError::External {
                program: self.script.display().to_string(),
                code: output.status.code().unwrap_or(1),
                output: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        info!(script = %self.script.display(), "layer guard passed");
        Ok(())
    }
}
