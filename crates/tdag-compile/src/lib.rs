//! Scenario compiler
//!
//! Freezes mutable source scenarios into provenance-stamped runtime copies
//! and records both hashes in a manifest. [`Compiler::check`] re-verifies
//! that manifest against the filesystem; [`Compiler::compile`] always ends
//! with a check of its own output.
//!
//! ```text
//! <source>/login.scenario.yml ──► <out>/login.scenario.yml
//!                                  # GENERATED_FROM: <source_rel>
//!                                  # SOURCE_SHA256: <hex>
//!                                  # GENERATED_AT: <utc>
//!                                  <verbatim source>
//! ```

#![allow(missing_docs)]

pub mod manifest;

pub use manifest::{Manifest, ManifestRow, MANIFEST_HEADER};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tdag_core::clock::now_utc_iso;
use tdag_core::config::{project_relative, ProjectLayout, MANIFEST_FILE, SCENARIO_SUFFIX};
use tdag_core::error::{DagError, IntegrityError, Result};
use tdag_core::scenario::list_scenario_files;
use tdag_core::ContentHash;
use tracing::{debug, info};

/// First-line prefix of every compiled scenario
pub const GENERATED_FROM: &str = "# GENERATED_FROM: ";
const SOURCE_SHA256: &str = "# SOURCE_SHA256: ";
const GENERATED_AT: &str = "# GENERATED_AT: ";

static SCENARIO_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^id:[ \t]*"?([A-Za-z0-9._-]+)"?[ \t]*\r?$"#)
        .unwrap_or_else(|_| unreachable!("scenario id pattern is static"))
});

/// Scenario id found by scanning for the first `id: <id>` line
#[must_use]
pub fn extract_scenario_id(content: &str) -> Option<&str> {
    SCENARIO_ID
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Compiled file text: the three provenance lines followed by the source
#[must_use]
pub fn render_compiled(
    source_rel: &str,
    source_hash: &ContentHash,
    compiled_at: &str,
    source: &str,
) -> String {
    [
        format!("{GENERATED_FROM}{source_rel}"),
        format!("{SOURCE_SHA256}{source_hash}"),
        format!("{GENERATED_AT}{compiled_at}"),
        source.to_string(),
    ]
    .join("\n")
}

/// Result of a successful check-only pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    pub files: usize,
}

/// Result of a successful compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub rows: Vec<ManifestRow>,
    pub check: CheckReport,
}

/// Source and runtime locations for one project
#[derive(Debug, Clone)]
pub struct Compiler {
    project_root: PathBuf,
    source_dir: PathBuf,
    out_dir: PathBuf,
}

impl Compiler {
    /// Compiler over explicit directories
    ///
    /// Relative directories are resolved against `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        source_dir: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
    ) -> Self {
        let project_root = project_root.into();
        let source_dir = project_root.join(source_dir);
        let out_dir = project_root.join(out_dir);
        Self {
            project_root,
            source_dir,
            out_dir,
        }
    }

    /// Compiler over the default source and compiled directories of a layout
    #[must_use]
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self {
            project_root: layout.project_root().to_path_buf(),
            source_dir: layout.source_scenarios(),
            out_dir: layout.compiled_scenarios(),
        }
    }

    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    /// Compile every source scenario and verify the result
    ///
    /// All source ids are validated before anything in the output directory
    /// is touched. Only `*.scenario.yml` files are removed from it.
    ///
    /// # Errors
    /// Returns a usage error when the source directory is missing or empty,
    /// a schema error for a missing or duplicate id, and any error
    /// [`Compiler::check`] reports on the fresh output
    pub fn compile(&self) -> Result<CompileReport> {
        if !self.source_dir.is_dir() {
            return Err(DagError::usage(format!(
                "source scenario directory not found: {}",
                self.source_dir.display()
            )));
        }
        let files = list_scenario_files(&self.source_dir)?;
        if files.is_empty() {
            return Err(DagError::usage(format!(
                "no source scenarios found in {}",
                self.source_dir.display()
            )));
        }

        let mut sources = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for file in files {
            let content = std::fs::read_to_string(&file).map_err(|e| DagError::io(&file, e))?;
            let id = extract_scenario_id(&content)
                .ok_or_else(|| DagError::schema(&file, "missing scenario id"))?
                .to_string();
            if !seen.insert(id.clone()) {
                return Err(DagError::schema(
                    &file,
                    format!("duplicate scenario id in source catalog: {id}"),
                ));
            }
            sources.push((file, id, content));
        }

        std::fs::create_dir_all(&self.out_dir).map_err(|e| DagError::io(&self.out_dir, e))?;
        for stale in list_scenario_files(&self.out_dir)? {
            std::fs::remove_file(&stale).map_err(|e| DagError::io(&stale, e))?;
            debug!(file = %stale.display(), "removed previously compiled scenario");
        }

        let mut manifest = Manifest::default();
        for (file, id, content) in sources {
            let source_rel = project_relative(&file, &self.project_root);
            let source_hash = ContentHash::compute(content.as_bytes());
            let runtime_file = self.out_dir.join(format!("{id}{SCENARIO_SUFFIX}"));
            let compiled_at = now_utc_iso();
            let generated = render_compiled(&source_rel, &source_hash, &compiled_at, &content);
            std::fs::write(&runtime_file, &generated).map_err(|e| DagError::io(&runtime_file, e))?;

            manifest.rows.push(ManifestRow {
                id,
                source_rel,
                source_sha256: source_hash,
                runtime_rel: project_relative(&runtime_file, &self.project_root),
                runtime_sha256: ContentHash::compute(generated.as_bytes()),
                compiled_at,
            });
        }
        manifest.write(&self.manifest_path())?;

        let check = self.check()?;
        info!(
            source = %self.source_dir.display(),
            runtime = %self.out_dir.display(),
            files = manifest.rows.len(),
            "scenarios compiled"
        );
        Ok(CompileReport {
            rows: manifest.rows,
            check,
        })
    }

    /// Re-verify the manifest against the filesystem without recompiling
    ///
    /// # Errors
    /// Returns the first [`IntegrityError`] found, in manifest row order,
    /// with the file-count comparison last
    pub fn check(&self) -> Result<CheckReport> {
        let manifest = Manifest::load(&self.manifest_path())?;
        let runtime_count = list_scenario_files(&self.out_dir)?.len();

        for row in &manifest.rows {
            let source_path = self.project_root.join(&row.source_rel);
            let runtime_path = self.project_root.join(&row.runtime_rel);
            if !source_path.exists() {
                return Err(IntegrityError::SourceMissing {
                    id: row.id.clone(),
                    path: source_path,
                }
                .into());
            }
            if !runtime_path.exists() {
                return Err(IntegrityError::RuntimeMissing {
                    id: row.id.clone(),
                    path: runtime_path,
                }
                .into());
            }

            if !row.source_matches(&ContentHash::of_file(&source_path)?) {
                return Err(IntegrityError::SourceChanged { id: row.id.clone() }.into());
            }
            if !row.runtime_matches(&ContentHash::of_file(&runtime_path)?) {
                return Err(IntegrityError::Drift {
                    id: row.id.clone(),
                    path: runtime_path,
                }
                .into());
            }

            let runtime = std::fs::read_to_string(&runtime_path)
                .map_err(|e| DagError::io(&runtime_path, e))?;
            let header = runtime.lines().next().unwrap_or_default();
            if header != format!("{GENERATED_FROM}{}", row.source_rel) {
                return Err(IntegrityError::HeaderMismatch {
                    id: row.id.clone(),
                    path: runtime_path,
                }
                .into());
            }
        }

        if manifest.rows.len() != runtime_count {
            return Err(IntegrityError::CountMismatch {
                manifest: manifest.rows.len(),
                runtime: runtime_count,
            }
            .into());
        }

        debug!(files = runtime_count, "compiled scenario check passed");
        Ok(CheckReport {
            source_dir: self.source_dir.clone(),
            out_dir: self.out_dir.clone(),
            files: runtime_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn id_scan_takes_first_well_formed_line() {
        assert_eq!(extract_scenario_id("# c\nid: login\n"), Some("login"));
        assert_eq!(extract_scenario_id("id: \"quoted.v2\"\n"), Some("quoted.v2"));
        assert_eq!(extract_scenario_id("id: has space\nid: second\n"), Some("second"));
        assert_eq!(extract_scenario_id("  id: indented\n"), None);
        assert_eq!(extract_scenario_id("outcome_id: x\n"), None);
    }

    #[test]
    fn compiled_text_has_three_header_lines() {
        let hash = ContentHash::compute(b"id: a\n");
        let text = render_compiled("src/a.scenario.yml", &hash, "2024-01-01T00:00:00Z", "id: a\n");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# GENERATED_FROM: src/a.scenario.yml");
        assert_eq!(lines[1], format!("# SOURCE_SHA256: {hash}"));
        assert_eq!(lines[2], "# GENERATED_AT: 2024-01-01T00:00:00Z");
        assert_eq!(lines[3], "id: a");
    }

    #[test]
    fn relative_dirs_resolve_against_project_root() {
        let compiler = Compiler::new("/proj", "src/scn", "/abs/out");
        assert_eq!(compiler.source_dir(), Path::new("/proj/src/scn"));
        assert_eq!(compiler.out_dir(), Path::new("/abs/out"));
        assert_eq!(
            compiler.manifest_path(),
            Path::new("/abs/out/.compiled-manifest.tsv")
        );
    }
}
