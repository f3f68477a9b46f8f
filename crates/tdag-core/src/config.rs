//! Runtime configuration and on-disk layout
//!
//! All stages agree on where artifacts live through [`ProjectLayout`].
//! The runtime root can be overridden with [`RUNTIME_ROOT_ENV`], which must
//! name a safe relative path.

use crate::error::{DagError, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the runtime root
pub const RUNTIME_ROOT_ENV: &str = "TDAG_RUNTIME_ROOT";

/// Runtime root used when the environment does not override it
pub const DEFAULT_RUNTIME_ROOT: &str = ".tdag/.runtime";

/// Project-relative directory holding source scenarios
pub const DEFAULT_SOURCE_DIR: &str = ".tdag/dag/scenarios";

/// File suffix identifying scenario files
pub const SCENARIO_SUFFIX: &str = ".scenario.yml";

/// Manifest file name inside the compiled scenario directory
pub const MANIFEST_FILE: &str = ".compiled-manifest.tsv";

/// A validated, project-relative runtime root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRoot(String);

impl RuntimeRoot {
    /// Validate a runtime root value
    ///
    /// # Errors
    /// Returns [`DagError::Usage`] for empty, `.`, `..`, absolute paths or
    /// any path containing `..`
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty()
            || value == "."
            || value == ".."
            || value.starts_with('/')
            || Path::new(&value).is_absolute()
            || value.contains("..")
        {
            return Err(DagError::usage(format!(
                "{RUNTIME_ROOT_ENV} must be a safe relative path (e.g. {DEFAULT_RUNTIME_ROOT}), got '{value}'"
            )));
        }
        Ok(Self(value))
    }

    /// Read the runtime root from the environment, falling back to the default
    ///
    /// # Errors
    /// Returns [`DagError::Usage`] if the override is unsafe
    pub fn from_env() -> Result<Self> {
        match std::env::var(RUNTIME_ROOT_ENV) {
            Ok(value) if !value.is_empty() => Self::new(value),
            _ => Self::new(DEFAULT_RUNTIME_ROOT),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Runtime root with platform separators normalized to `/`
    #[must_use]
    pub fn posix(&self) -> String {
        self.0.replace('\\', "/").trim_end_matches('/').to_string()
    }
}

impl Default for RuntimeRoot {
    fn default() -> Self {
        Self(DEFAULT_RUNTIME_ROOT.to_string())
    }
}

/// Resolved artifact locations for one project
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    project_root: PathBuf,
    runtime_root: RuntimeRoot,
}

impl ProjectLayout {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, runtime_root: RuntimeRoot) -> Self {
        Self {
            project_root: project_root.into(),
            runtime_root,
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[must_use]
    pub fn runtime_root(&self) -> &RuntimeRoot {
        &self.runtime_root
    }

    /// `<project>/<runtime_root>`
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.project_root.join(self.runtime_root.as_str())
    }

    /// Default source scenario directory
    #[must_use]
    pub fn source_scenarios(&self) -> PathBuf {
        self.project_root.join(DEFAULT_SOURCE_DIR)
    }

    /// Compiled (runtime) scenario directory
    #[must_use]
    pub fn compiled_scenarios(&self) -> PathBuf {
        self.runtime_dir().join("dag").join("scenarios")
    }

    #[must_use]
    pub fn pipelines_dir(&self) -> PathBuf {
        self.runtime_dir().join("dag").join("pipelines")
    }

    #[must_use]
    pub fn default_pipeline(&self) -> PathBuf {
        self.pipelines_dir().join("default.pipeline.yml")
    }

    #[must_use]
    pub fn evidence_root(&self) -> PathBuf {
        self.runtime_dir().join("evidence").join("dag")
    }

    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.runtime_dir().join("dag").join("state").join("last-run.json")
    }

    /// Resolve a CLI path against the project root; absolute paths pass through
    #[must_use]
    pub fn resolve(&self, value: impl AsRef<Path>) -> PathBuf {
        let value = value.as_ref();
        if value.is_absolute() {
            value.to_path_buf()
        } else {
            self.project_root.join(value)
        }
    }

    /// Derive the layout from a pipeline file path
    ///
    /// The pipeline must live under `<runtime_root>/dag/pipelines/` and end
    /// in `.yml`; everything before that marker is the project root.
    ///
    /// # Errors
    /// Returns [`DagError::Usage`] if the path is outside the pipelines dir
    pub fn from_pipeline_path(pipeline: &Path, runtime_root: RuntimeRoot) -> Result<Self> {
        let normalized = pipeline.to_string_lossy().replace('\\', "/");
        let marker = format!("/{}/dag/pipelines/", runtime_root.posix());
        let outside = || {
            DagError::usage(format!(
                "pipeline path must be under {}/dag/pipelines and end with .yml: {}",
                runtime_root.as_str(),
                pipeline.display()
            ))
        };
        if !normalized.ends_with(".yml") {
            return Err(outside());
        }
        let Some(pos) = normalized.find(&marker) else {
            return Err(outside());
        };
        let root = &normalized[..pos];
        let project_root = if root.is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(root)
        };
        Ok(Self::new(project_root, runtime_root))
    }
}

/// Render `path` relative to `root` with `/` separators
///
/// Paths outside `root` are rendered in full.
#[must_use]
pub fn project_relative(path: &Path, root: &Path) -> String {
    if path == root {
        return ".".to_string();
    }
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_root_rejects_unsafe_values() {
        for bad in ["", ".", "..", "/abs/root", "a/../b", "..hidden"] {
            assert!(RuntimeRoot::new(bad).is_err(), "accepted {bad:?}");
        }
        assert!(RuntimeRoot::new(".tdag/.runtime").is_ok());
        assert!(RuntimeRoot::new("build/rt").is_ok());
    }

    #[test]
    fn layout_paths() {
        let layout = ProjectLayout::new("/work/proj", RuntimeRoot::default());
        assert_eq!(
            layout.compiled_scenarios(),
            PathBuf::from("/work/proj/.tdag/.runtime/dag/scenarios")
        );
        assert_eq!(
            layout.state_file(),
            PathBuf::from("/work/proj/.tdag/.runtime/dag/state/last-run.json")
        );
        assert_eq!(
            layout.resolve("x/y"),
            PathBuf::from("/work/proj/x/y")
        );
        assert_eq!(layout.resolve("/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn layout_from_pipeline_path() {
        let layout = ProjectLayout::from_pipeline_path(
            Path::new("/work/proj/.tdag/.runtime/dag/pipelines/default.pipeline.yml"),
            RuntimeRoot::default(),
        )
        .unwrap();
        assert_eq!(layout.project_root(), Path::new("/work/proj"));
    }

    #[test]
    fn pipeline_outside_pipelines_dir_is_usage_error() {
        let err = ProjectLayout::from_pipeline_path(
            Path::new("/work/proj/pipeline.yml"),
            RuntimeRoot::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);

        let err = ProjectLayout::from_pipeline_path(
            Path::new("/work/proj/.tdag/.runtime/dag/pipelines/default.txt"),
            RuntimeRoot::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);
    }

    #[test]
    fn relative_rendering() {
        let root = Path::new("/work/proj");
        assert_eq!(
            project_relative(Path::new("/work/proj/a/b.scenario.yml"), root),
            "a/b.scenario.yml"
        );
        assert_eq!(project_relative(root, root), ".");
    }
}
