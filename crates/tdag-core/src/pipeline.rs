//! Pipeline documents
//!
//! The generator renders a [`Pipeline`] to text and the executor parses it
//! back. The document has top-level scalar keys followed by a `nodes:` block
//! of `- id:` records with indented fields.

use crate::error::{DagError, Result};
use crate::glob::MATCH_ALL;
use crate::text::{is_valid_id, quote, split_csv, unquote};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// Pipeline id used when the document does not declare one
pub const DEFAULT_PIPELINE_ID: &str = "default";

/// Prefix shared by synthetic pipeline ids
pub const SYNTHETIC_PREFIX: &str = "synthetic-";

/// Node type tags emitted by the generator
pub mod node_type {
    pub const UTILITY: &str = "utility";
    pub const TDD_RED: &str = "tdd_red";
    pub const IMPL: &str = "impl";
    pub const UNIT_NORMAL: &str = "unit_normal";
    pub const UNIT_BOUNDARY: &str = "unit_boundary";
    pub const UNIT_FAILURE: &str = "unit_failure";
    pub const TDD_GREEN: &str = "tdd_green";
    pub const SMOKE_BOUNDARY: &str = "smoke_boundary";
    pub const SMOKE: &str = "smoke";
    pub const E2E: &str = "e2e";
    pub const SYNTHETIC: &str = "synthetic";
}

/// Ids of the global nodes in a catalog pipeline
pub mod global {
    pub const PREFLIGHT: &str = "preflight";
    pub const SMOKE_GATE: &str = "smoke_gate";
    pub const E2E_GATE: &str = "e2e_gate";
}

/// One unit of pipeline work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineNode {
    pub id: String,
    pub node_type: String,
    pub deps: Vec<String>,
    pub changed_paths: Vec<String>,
    pub run: String,
    pub verify: String,
}

impl PipelineNode {
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        run: impl Into<String>,
        verify: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            deps: Vec::new(),
            changed_paths: vec![MATCH_ALL.to_string()],
            run: run.into(),
            verify: verify.into(),
        }
    }

    #[must_use]
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_changed_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Global gates are excluded from incidental forward selection
    #[must_use]
    pub fn is_global_gate(&self) -> bool {
        (self.node_type == node_type::SMOKE && self.id == global::SMOKE_GATE)
            || (self.node_type == node_type::E2E && self.id == global::E2E_GATE)
    }

    /// Dependencies rendered as the comma-separated form used in documents
    #[must_use]
    pub fn deps_csv(&self) -> String {
        self.deps.join(",")
    }
}

/// An ordered list of nodes under a pipeline id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub pipeline_id: String,
    pub description: Option<String>,
    pub nodes: Vec<PipelineNode>,
}

impl Pipeline {
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            description: None,
            nodes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn push(&mut self, node: PipelineNode) {
        self.nodes.push(node);
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.pipeline_id.starts_with(SYNTHETIC_PREFIX)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check node id uniqueness and that every dependency resolves
    ///
    /// Cycles pass this check; the executor detects
    /// them while scheduling the selected subgraph.
    ///
    /// # Errors
    /// Returns [`DagError::Topology`] on duplicate ids or unknown deps
    pub fn check_references(&self) -> Result<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(DagError::topology(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }
        for node in &self.nodes {
            if let Some(dep) = node.deps.iter().find(|d| !ids.contains(d.as_str())) {
                return Err(DagError::topology(format!(
                    "node '{}' references unknown dep '{dep}'",
                    node.id
                )));
            }
        }
        Ok(())
    }

    /// Render the pipeline document
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("version: 1\n");
        let _ = writeln!(out, "pipeline_id: {}", self.pipeline_id);
        if let Some(description) = &self.description {
            let _ = writeln!(out, "description: {description}");
        }
        out.push_str("nodes:\n");
        for node in &self.nodes {
            let _ = writeln!(out, "  - id: {}", node.id);
            let _ = writeln!(out, "    type: {}", node.node_type);
            let _ = writeln!(out, "    deps: {}", quote(&node.deps_csv()));
            let _ = writeln!(
                out,
                "    changed_paths: {}",
                quote(&node.changed_paths.join(","))
            );
            let _ = writeln!(out, "    run: {}", quote(&node.run));
            let _ = writeln!(out, "    verify: {}", quote(&node.verify));
        }
        out
    }

    /// Parse a pipeline document
    ///
    /// # Errors
    /// Returns [`DagError::Schema`] for malformed documents and
    /// [`DagError::Topology`] for duplicate ids or unknown deps
    pub fn parse(content: &str, file: &Path) -> Result<Self> {
        let mut pipeline_id: Option<String> = None;
        let mut description = None;
        let mut nodes = Vec::new();
        let mut current: Option<NodeDraft> = None;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('-') {
                let Some(raw) = rest.trim_start().strip_prefix("id:") else {
                    return Err(DagError::schema(
                        file,
                        format!("line {line_no}: list item must start with 'id:'"),
                    ));
                };
                if let Some(draft) = current.take() {
                    nodes.push(draft.finish(file)?);
                }
                current = Some(NodeDraft::new(unquote(raw.trim()), line_no, file)?);
                continue;
            }

            let indented = line.starts_with(char::is_whitespace);
            let Some((key, raw)) = trimmed.split_once(':') else {
                return Err(DagError::schema(
                    file,
                    format!("line {line_no}: expected 'key: value'"),
                ));
            };
            let value = unquote(raw.trim());

            if indented {
                if let Some(draft) = current.as_mut() {
                    draft.set(key, value, line_no, file)?;
                }
                continue;
            }

            match key {
                "pipeline_id" => {
                    if !is_valid_id(&value) {
                        return Err(DagError::schema(
                            file,
                            format!("pipeline_id '{value}' must match [A-Za-z0-9._-]+"),
                        ));
                    }
                    pipeline_id = Some(value);
                }
                "description" => description = Some(value),
                _ => {}
            }
        }
        if let Some(draft) = current.take() {
            nodes.push(draft.finish(file)?);
        }

        if nodes.is_empty() {
            return Err(DagError::schema(file, "no nodes parsed from pipeline"));
        }

        let pipeline = Self {
            pipeline_id: pipeline_id.unwrap_or_else(|| DEFAULT_PIPELINE_ID.to_string()),
            description,
            nodes,
        };
        pipeline.check_references()?;
        Ok(pipeline)
    }

    /// Read and parse a pipeline file
    ///
    /// # Errors
    /// Returns IO, schema or topology errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DagError::io(path, e))?;
        Self::parse(&content, path)
    }
}

/// A node record under construction with field presence tracking
#[derive(Debug)]
struct NodeDraft {
    id: String,
    line: usize,
    node_type: Option<String>,
    deps: Option<String>,
    changed_paths: Option<String>,
    run: Option<String>,
    verify: Option<String>,
}

impl NodeDraft {
    fn new(id: String, line: usize, file: &Path) -> Result<Self> {
        if !is_valid_id(&id) {
            return Err(DagError::schema(
                file,
                format!("line {line}: node id '{id}' must match [A-Za-z0-9._-]+"),
            ));
        }
        Ok(Self {
            id,
            line,
            node_type: None,
            deps: None,
            changed_paths: None,
            run: None,
            verify: None,
        })
    }

    fn set(&mut self, key: &str, value: String, line: usize, file: &Path) -> Result<()> {
        let slot = match key {
            "type" => &mut self.node_type,
            "deps" => &mut self.deps,
            "changed_paths" => &mut self.changed_paths,
            "run" => &mut self.run,
            "verify" => &mut self.verify,
            _ => return Ok(()),
        };
        if slot.replace(value).is_some() {
            return Err(DagError::schema(
                file,
                format!("line {line}: duplicate '{key}' for node '{}'", self.id),
            ));
        }
        Ok(())
    }

    fn finish(self, file: &Path) -> Result<PipelineNode> {
        let missing = |field: &str| {
            DagError::schema(
                file,
                format!("node '{}' (line {}) missing {field}", self.id, self.line),
            )
        };
        let run = self.run.clone().filter(|v| !v.trim().is_empty()).ok_or_else(|| missing("run"))?;
        let verify = self
            .verify
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| missing("verify"))?;
        let changed_paths = match self.changed_paths.as_deref().map(split_csv) {
            Some(paths) if !paths.is_empty() => paths,
            _ => vec![MATCH_ALL.to_string()],
        };
        Ok(PipelineNode {
            deps: split_csv(self.deps.as_deref().unwrap_or_default()),
            node_type: self.node_type.unwrap_or_default(),
            changed_paths,
            run,
            verify,
            id: self.id,
        })
    }
}
