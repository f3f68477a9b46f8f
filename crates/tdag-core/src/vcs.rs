//! Version-control helpers
//!
//! Git is an optional collaborator: every helper degrades to a fallback
//! instead of failing when git is missing or the directory is not a repo.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Top-level directory of the git work tree containing `dir`
#[must_use]
pub fn toplevel(dir: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!root.is_empty()).then(|| PathBuf::from(root))
}

/// Resolve the project root: explicit path, else git top-level, else `cwd`
#[must_use]
pub fn resolve_project_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
    }
    toplevel(cwd).unwrap_or_else(|| cwd.to_path_buf())
}

/// Paths reported by `git status --porcelain` in `repo`
///
/// Returns an empty list when git fails.
#[must_use]
pub fn changed_files(repo: &Path) -> Vec<String> {
    let output = match Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["status", "--porcelain"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::warn!(code = ?output.status.code(), "git status failed; no changed files");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(error = %err, "git unavailable; no changed files");
            return Vec::new();
        }
    };
    parse_porcelain(&String::from_utf8_lossy(&output.stdout))
}

/// Extract paths from porcelain v1 status lines (`XY path`)
#[must_use]
pub fn parse_porcelain(status: &str) -> Vec<String> {
    status
        .lines()
        .filter_map(|line| line.get(3..))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_paths() {
        let status = " M src/lib.rs\n?? new file.txt\nA  a/b.txt\n\n";
        assert_eq!(
            parse_porcelain(status),
            vec!["src/lib.rs", "new file.txt", "a/b.txt"]
        );
    }

    #[test]
    fn explicit_root_wins() {
        let cwd = Path::new("/tmp/work");
        assert_eq!(
            resolve_project_root(Some(Path::new("proj")), cwd),
            PathBuf::from("/tmp/work/proj")
        );
        assert_eq!(
            resolve_project_root(Some(Path::new("/abs")), cwd),
            PathBuf::from("/abs")
        );
    }
}
