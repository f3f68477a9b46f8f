//! Scenario catalog loading and validation

use std::collections::HashSet;
use std::path::Path;
use tdag_core::error::{DagError, Result};
use tdag_core::scenario::{list_scenario_files, validate_references, Scenario, ScenarioDocument};
use tracing::debug;

/// A validated set of scenarios in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
}

impl Catalog {
    /// Load every `*.scenario.yml` in `dir` and validate the whole catalog
    ///
    /// # Errors
    /// Returns a usage error if the directory is missing or holds no
    /// scenarios, and a schema error naming the first offending file
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(DagError::usage(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }
        let files = list_scenario_files(dir)?;
        if files.is_empty() {
            return Err(DagError::usage(format!(
                "no scenario files found in {} (at least one .scenario.yml is required)",
                dir.display()
            )));
        }
        let mut scenarios = Vec::with_capacity(files.len());
        for file in &files {
            let doc = ScenarioDocument::load(file)?;
            scenarios.push(Scenario::from_document(&doc, file)?);
        }
        debug!(dir = %dir.display(), count = scenarios.len(), "scenario catalog loaded");
        Self::from_scenarios(scenarios)
    }

    /// Check id uniqueness and cross-references
    ///
    /// # Errors
    /// Returns [`DagError::Schema`] for duplicate ids or unknown references
    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(scenarios.len());
        for scenario in &scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(DagError::schema(
                    &scenario.source,
                    format!("duplicate scenario id '{}'", scenario.id),
                ));
            }
        }
        validate_references(&scenarios)?;
        Ok(Self { scenarios })
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
