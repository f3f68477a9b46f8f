//! Scenario records
//!
//! A scenario file is a line-oriented list of `key: value` records. Parsing
//! happens in two steps:
//! 1. [`ScenarioDocument::parse`] tracks which recognized keys are present
//!    and strips quoting.
//! 2. [`Scenario::from_document`] validates the per-scenario schema and
//!    yields a typed record.
//!
//! Cross-references (`depends_on`, `linked_nodes`) can only be checked
//! against a whole catalog; see [`validate_references`].

use crate::config::SCENARIO_SUFFIX;
use crate::error::{DagError, Result};
use crate::text::{is_noop_command, is_valid_id, split_bundle, split_csv, strip_quotes};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Recognized scenario keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScenarioKey {
    Id,
    OutcomeId,
    CapabilityId,
    StabilityLayer,
    DependsOn,
    LinkedNodes,
    ChangedPaths,
    RedRun,
    ImplRun,
    GreenRun,
    Verify,
    UnitNormalTests,
    UnitBoundaryTests,
    UnitFailureTests,
    BoundarySmokeTests,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 15] = [
        Self::Id,
        Self::OutcomeId,
        Self::CapabilityId,
        Self::StabilityLayer,
        Self::DependsOn,
        Self::LinkedNodes,
        Self::ChangedPaths,
        Self::RedRun,
        Self::ImplRun,
        Self::GreenRun,
        Self::Verify,
        Self::UnitNormalTests,
        Self::UnitBoundaryTests,
        Self::UnitFailureTests,
        Self::BoundarySmokeTests,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::OutcomeId => "outcome_id",
            Self::CapabilityId => "capability_id",
            Self::StabilityLayer => "stability_layer",
            Self::DependsOn => "depends_on",
            Self::LinkedNodes => "linked_nodes",
            Self::ChangedPaths => "changed_paths",
            Self::RedRun => "red_run",
            Self::ImplRun => "impl_run",
            Self::GreenRun => "green_run",
            Self::Verify => "verify",
            Self::UnitNormalTests => "unit_normal_tests",
            Self::UnitBoundaryTests => "unit_boundary_tests",
            Self::UnitFailureTests => "unit_failure_tests",
            Self::BoundarySmokeTests => "boundary_smoke_tests",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, presence-tracked scenario fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioDocument {
    fields: BTreeMap<ScenarioKey, String>,
}

impl ScenarioDocument {
    /// Parse scenario text
    ///
    /// Blank lines, `#` comments (including compiler provenance headers) and
    /// unrecognized keys are skipped.
    ///
    /// # Errors
    /// Returns [`DagError::Schema`] if a recognized key appears twice
    pub fn parse(content: &str, file: &Path) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for line in content.lines() {
            if line.starts_with('#') {
                continue;
            }
            let Some((key, raw)) = split_record(line) else {
                continue;
            };
            let Some(key) = ScenarioKey::from_key(key) else {
                continue;
            };
            let value = strip_quotes(raw.trim()).trim().to_string();
            if fields.insert(key, value).is_some() {
                return Err(DagError::schema(file, format!("duplicate {key} key")));
            }
        }
        Ok(Self { fields })
    }

    /// Read and parse a scenario file
    ///
    /// # Errors
    /// Returns IO or schema errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DagError::io(path, e))?;
        Self::parse(&content, path)
    }

    #[must_use]
    pub fn get(&self, key: ScenarioKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    /// Value if present and non-empty
    #[must_use]
    pub fn non_empty(&self, key: ScenarioKey) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

/// Split `key: value` where key is `[a-z_]+` at column zero
fn split_record(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
        return None;
    }
    Some((key, rest))
}

/// Scenario stability layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StabilityLayer {
    Core,
    System,
    Experimental,
}

impl StabilityLayer {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::System => "system",
            Self::Experimental => "experimental",
        }
    }
}

impl FromStr for StabilityLayer {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "core" => Ok(Self::Core),
            "system" => Ok(Self::System),
            "experimental" => Ok(Self::Experimental),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StabilityLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub id: String,
    pub outcome_id: String,
    pub capability_id: String,
    pub stability_layer: StabilityLayer,
    pub depends_on: Vec<String>,
    pub linked_nodes: Vec<String>,
    pub changed_paths: Vec<String>,
    pub red_run: String,
    pub impl_run: String,
    pub green_run: String,
    pub verify: String,
    pub unit_normal_tests: [String; 2],
    pub unit_boundary_tests: [String; 2],
    pub unit_failure_tests: [String; 2],
    pub boundary_smoke_tests: [String; 5],
    /// File the scenario was read from
    pub source: PathBuf,
}

impl Scenario {
    /// Validate a parsed document into a typed scenario
    ///
    /// Checks field presence, the stability layer enum, command
    /// non-emptiness and no-op rejection, bundle sizes and intra-bundle
    /// uniqueness, and self-references. Catalog-level reference checks are
    /// left to [`validate_references`].
    ///
    /// # Errors
    /// Returns [`DagError::Schema`] naming `file` on the first violation
    pub fn from_document(doc: &ScenarioDocument, file: &Path) -> Result<Self> {
        let require = |key: ScenarioKey| -> Result<String> {
            doc.non_empty(key)
                .map(str::to_string)
                .ok_or_else(|| DagError::schema(file, format!("missing {key}")))
        };

        let id = require(ScenarioKey::Id)?;
        if !is_valid_id(&id) {
            return Err(DagError::schema(
                file,
                format!("id '{id}' must match [A-Za-z0-9._-]+"),
            ));
        }
        let outcome_id = require(ScenarioKey::OutcomeId)?;
        let capability_id = require(ScenarioKey::CapabilityId)?;
        let layer = require(ScenarioKey::StabilityLayer)?;
        let stability_layer = layer.parse().map_err(|()| {
            DagError::schema(file, "stability_layer must be core|system|experimental")
        })?;
        let linked_raw = doc.non_empty(ScenarioKey::LinkedNodes).ok_or_else(|| {
            DagError::schema(
                file,
                "missing linked_nodes (must reference at least one bug-prone linked scenario id)",
            )
        })?;
        let changed_paths = split_csv(&require(ScenarioKey::ChangedPaths)?);

        let red_run = require_command(doc, ScenarioKey::RedRun, file)?;
        let impl_run = require_command(doc, ScenarioKey::ImplRun, file)?;
        let green_run = require_command(doc, ScenarioKey::GreenRun, file)?;
        let verify = require_command(doc, ScenarioKey::Verify, file)?;

        let unit_normal_tests = bundle::<2>(doc, ScenarioKey::UnitNormalTests, file)?;
        let unit_boundary_tests = bundle::<2>(doc, ScenarioKey::UnitBoundaryTests, file)?;
        let unit_failure_tests = bundle::<2>(doc, ScenarioKey::UnitFailureTests, file)?;
        let boundary_smoke_tests = bundle::<5>(doc, ScenarioKey::BoundarySmokeTests, file)?;

        let depends_on = split_csv(doc.get(ScenarioKey::DependsOn).unwrap_or_default());
        let linked_nodes = split_csv(linked_raw);
        for (key, ids) in [
            (ScenarioKey::DependsOn, &depends_on),
            (ScenarioKey::LinkedNodes, &linked_nodes),
        ] {
            if ids.iter().any(|other| *other == id) {
                return Err(DagError::schema(
                    file,
                    format!("{key} must not include self ('{id}')"),
                ));
            }
        }
        if linked_nodes.is_empty() {
            return Err(DagError::schema(
                file,
                "linked_nodes must contain at least one scenario id",
            ));
        }

        Ok(Self {
            id,
            outcome_id,
            capability_id,
            stability_layer,
            depends_on,
            linked_nodes,
            changed_paths,
            red_run,
            impl_run,
            green_run,
            verify,
            unit_normal_tests,
            unit_boundary_tests,
            unit_failure_tests,
            boundary_smoke_tests,
            source: file.to_path_buf(),
        })
    }
}

fn validate_command(cmd: &str, key: ScenarioKey, file: &Path) -> Result<()> {
    if cmd.trim().is_empty() {
        return Err(DagError::schema(
            file,
            format!("{key} contains an empty command"),
        ));
    }
    if is_noop_command(cmd) {
        return Err(DagError::schema(
            file,
            format!("{key} contains no-op command '{cmd}'"),
        ));
    }
    Ok(())
}

fn require_command(doc: &ScenarioDocument, key: ScenarioKey, file: &Path) -> Result<String> {
    let cmd = doc
        .non_empty(key)
        .ok_or_else(|| DagError::schema(file, format!("missing {key}")))?;
    validate_command(cmd, key, file)?;
    Ok(cmd.to_string())
}

fn bundle<const N: usize>(
    doc: &ScenarioDocument,
    key: ScenarioKey,
    file: &Path,
) -> Result<[String; N]> {
    let commands = split_bundle(doc.get(key).unwrap_or_default());
    let count = commands.len();
    let commands: [String; N] = commands.try_into().map_err(|_| {
        DagError::schema(
            file,
            format!("{key} must contain exactly {N} commands (delimiter '|||'), found {count}"),
        )
    })?;
    let mut seen = HashSet::with_capacity(N);
    for cmd in &commands {
        if !seen.insert(cmd.as_str()) {
            return Err(DagError::schema(
                file,
                format!("{key} must not contain duplicate commands"),
            ));
        }
        validate_command(cmd, key, file)?;
    }
    Ok(commands)
}

/// Check that every `depends_on`/`linked_nodes` id exists in the catalog
///
/// # Errors
/// Returns [`DagError::Schema`] naming the referencing scenario's file
pub fn validate_references(scenarios: &[Scenario]) -> Result<()> {
    let known: HashSet<&str> = scenarios.iter().map(|s| s.id.as_str()).collect();
    for scenario in scenarios {
        for (key, ids) in [
            (ScenarioKey::DependsOn, &scenario.depends_on),
            (ScenarioKey::LinkedNodes, &scenario.linked_nodes),
        ] {
            if let Some(unknown) = ids.iter().find(|id| !known.contains(id.as_str())) {
                return Err(DagError::schema(
                    &scenario.source,
                    format!("{key} references unknown scenario id '{unknown}'"),
                ));
            }
        }
    }
    Ok(())
}

/// Scenario files (`*.scenario.yml`) directly inside `dir`, sorted by path
///
/// # Errors
/// Returns [`DagError::Io`] if the directory cannot be read
pub fn list_scenario_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DagError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DagError::io(dir, e))?;
        let is_file = entry.file_type().map_err(|e| DagError::io(entry.path(), e))?.is_file();
        if is_file && entry.file_name().to_string_lossy().ends_with(SCENARIO_SUFFIX) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
