//! Error types shared by the compiler, generator and executor
//!
//! Every fatal condition in the pipeline maps onto one of the
//! [`ErrorKind`] categories:
//! - schema: malformed or incomplete scenario/pipeline definitions
//! - integrity: hash mismatch, drift, manifest inconsistencies
//! - topology: unknown dependency references, cycles
//! - usage: bad arguments or configuration
//!
//! A failing run/verify command is not an error. It is reported as a failed
//! run outcome by the executor.

use std::path::{Path, PathBuf};

/// Main error type for all tdd-dag stages
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// Malformed or incomplete definition, named by file
    #[error("{message} in {}", file.display())]
    Schema { file: PathBuf, message: String },

    /// Compiled artifacts disagree with the manifest or the sources
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Unknown dependency, duplicate node or cycle
    #[error("{0}")]
    Topology(String),

    /// Bad CLI argument or environment configuration
    #[error("{0}")]
    Usage(String),

    /// Filesystem failure
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A process could not be started at all
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external collaborator command exited non-zero
    #[error("{program} exited with code {code}: {output}")]
    External {
        program: String,
        code: i32,
        output: String,
    },
}

/// Coarse classification of [`DagError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Integrity,
    Topology,
    Usage,
    Io,
    External,
}

impl DagError {
    /// Create schema error for a file
    pub fn schema(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Schema {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create topology error
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Topology(_) => ErrorKind::Topology,
            Self::Usage(_) => ErrorKind::Usage,
            Self::Io { .. } => ErrorKind::Io,
            Self::Spawn { .. } | Self::External { .. } => ErrorKind::External,
        }
    }
}

/// Compiled-scenario integrity failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("compiled manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("malformed manifest row {line}: expected at least 5 tab-separated columns")]
    MalformedRow { line: usize },

    #[error("source scenario missing for compiled row '{id}': {}", path.display())]
    SourceMissing { id: String, path: PathBuf },

    #[error("runtime scenario missing for compiled row '{id}': {}", path.display())]
    RuntimeMissing { id: String, path: PathBuf },

    #[error("source scenario changed after compile for '{id}'. Recompile before building the pipeline.")]
    SourceChanged { id: String },

    #[error("runtime scenario drift detected for '{id}' (manual edit suspected): {}", path.display())]
    Drift { id: String, path: PathBuf },

    #[error("generated header mismatch for '{id}': {}", path.display())]
    HeaderMismatch { id: String, path: PathBuf },

    #[error("compiled manifest/runtime file count mismatch (manifest={manifest} runtime={runtime})")]
    CountMismatch { manifest: usize, runtime: usize },
}

/// Result alias used across the workspace
pub type Result<T, E = DagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_file() {
        let err = DagError::schema("scenarios/a.scenario.yml", "missing red_run");
        assert_eq!(err.to_string(), "missing red_run in scenarios/a.scenario.yml");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn integrity_errors_are_transparent() {
        let err: DagError = IntegrityError::SourceChanged { id: "login".into() }.into();
        assert!(err.to_string().starts_with("source scenario changed after compile for 'login'"));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn drift_mentions_manual_edit() {
        let err = IntegrityError::Drift {
            id: "login".into(),
            path: PathBuf::from("rt/login.scenario.yml"),
        };
        assert!(err.to_string().contains("manual edit suspected"));
    }
}
