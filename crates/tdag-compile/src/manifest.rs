//! Compiled-scenario manifest
//!
//! A tab-separated ledger with one row per compiled scenario. It is the
//! single source of truth for drift detection.

use std::fmt::Write as _;
use std::path::Path;
use tdag_core::error::{DagError, IntegrityError, Result};
use tdag_core::ContentHash;

/// Column header written as the first manifest line
pub const MANIFEST_HEADER: [&str; 6] = [
    "id",
    "source_rel",
    "source_sha256",
    "runtime_rel",
    "runtime_sha256",
    "compiled_at",
];

/// One compiled scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub id: String,
    pub source_rel: String,
    pub source_sha256: ContentHash,
    pub runtime_rel: String,
    pub runtime_sha256: ContentHash,
    pub compiled_at: String,
}

impl ManifestRow {
    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.source_rel,
            self.source_sha256,
            self.runtime_rel,
            self.runtime_sha256,
            self.compiled_at
        )
    }

    /// Whether `actual` equals the recorded source hash
    #[must_use]
    pub fn source_matches(&self, actual: &ContentHash) -> bool {
        self.source_sha256 == *actual
    }

    /// Whether `actual` equals the recorded runtime hash
    #[must_use]
    pub fn runtime_matches(&self, actual: &ContentHash) -> bool {
        self.runtime_sha256 == *actual
    }
}

/// The manifest table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Render with header and trailing newline
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = MANIFEST_HEADER.join("\t");
        out.push('\n');
        for row in &self.rows {
            let _ = writeln!(out, "{}", row.to_line());
        }
        out
    }

    /// Parse manifest text read from `file`
    ///
    /// The first non-blank line is the header and is skipped; after it,
    /// blank lines and rows with an empty id are skipped. A missing
    /// `compiled_at` column is tolerated.
    ///
    /// # Errors
    /// Returns [`IntegrityError::MalformedRow`] for rows with fewer than
    /// five columns and [`DagError::Schema`] for a hash column that is not
    /// 64 hex characters
    pub fn parse(content: &str, file: &Path) -> Result<Self> {
        let mut rows = Vec::new();
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty());
        lines.next();
        for (index, line) in lines {
            let cols: Vec<&str> = line.split('\t').collect();
            let id = cols[0];
            if id.is_empty() {
                continue;
            }
            if cols.len() < 5 {
                return Err(IntegrityError::MalformedRow { line: index + 1 }.into());
            }
            let hash = |column: usize| {
                cols[column].parse::<ContentHash>().map_err(|err| {
                    DagError::schema(
                        file,
                        format!(
                            "manifest row '{id}' (line {}): {} {err}",
                            index + 1,
                            MANIFEST_HEADER[column]
                        ),
                    )
                })
            };
            rows.push(ManifestRow {
                id: id.to_string(),
                source_rel: cols[1].to_string(),
                source_sha256: hash(2)?,
                runtime_rel: cols[3].to_string(),
                runtime_sha256: hash(4)?,
                compiled_at: cols.get(5).copied().unwrap_or_default().to_string(),
            });
        }
        Ok(Self { rows })
    }

    /// Load the manifest file
    ///
    /// # Errors
    /// Returns [`IntegrityError::ManifestMissing`] if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IntegrityError::ManifestMissing(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path).map_err(|e| DagError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Write the manifest file in one piece
    ///
    /// # Errors
    /// Returns [`DagError::Io`] on write failure
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).map_err(|e| DagError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FILE: &str = ".compiled-manifest.tsv";

    fn row(id: &str) -> ManifestRow {
        ManifestRow {
            id: id.into(),
            source_rel: format!("src/{id}.scenario.yml"),
            source_sha256: ContentHash::compute(format!("source {id}").as_bytes()),
            runtime_rel: format!("rt/{id}.scenario.yml"),
            runtime_sha256: ContentHash::compute(format!("runtime {id}").as_bytes()),
            compiled_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn parse(text: &str) -> Result<Manifest> {
        Manifest::parse(text, Path::new(FILE))
    }

    #[test]
    fn render_starts_with_header() {
        let manifest = Manifest { rows: vec![row("a")] };
        let text = manifest.render();
        assert_eq!(
            text.lines().next().unwrap(),
            "id\tsource_rel\tsource_sha256\truntime_rel\truntime_sha256\tcompiled_at"
        );
        assert!(text.ends_with('\n'));
        assert_eq!(parse(&text).unwrap(), manifest);
    }

    #[test]
    fn parse_skips_blank_and_empty_id_rows() {
        let hash = ContentHash::compute(b"x");
        let text = format!("id\tsource_rel\n\n\tx\ty\nb\ts\t{hash}\tr\t{hash}\n");
        let manifest = parse(&text).unwrap();
        assert_eq!(manifest.rows.len(), 1);
        assert_eq!(manifest.rows[0].compiled_at, "");
        assert!(manifest.rows[0].source_matches(&hash));
    }

    #[test]
    fn row_with_id_named_id_is_kept() {
        let manifest = Manifest {
            rows: vec![row("id"), row("b")],
        };
        assert_eq!(parse(&manifest.render()).unwrap().rows.len(), 2);
    }

    #[test]
    fn malformed_hash_names_the_row() {
        let text = format!(
            "{}\na\ts\tnot-hex\tr\t{}\n",
            MANIFEST_HEADER.join("\t"),
            ContentHash::compute(b"r")
        );
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, DagError::Schema { .. }));
        let message = err.to_string();
        assert!(message.contains("manifest row 'a' (line 2): source_sha256"));
        assert!(message.contains(FILE));
    }

    #[test]
    fn short_rows_are_malformed() {
        let err = parse("id\tsource_rel\na\tb\n").unwrap_err();
        assert!(matches!(
            err,
            DagError::Integrity(IntegrityError::MalformedRow { line: 2 })
        ));
    }

    #[test]
    fn missing_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("nope.tsv")).unwrap_err();
        assert!(matches!(
            err,
            DagError::Integrity(IntegrityError::ManifestMissing(_))
        ));
    }
}
