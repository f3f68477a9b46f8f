//! Testing utilities for the tdd-dag workspace
//!
//! Shared fixtures: scenario text builders and temporary project layouts.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use tdag_core::config::{ProjectLayout, RuntimeRoot, SCENARIO_SUFFIX};
use tdag_core::scenario::ScenarioKey;
use tempfile::TempDir;

/// Builder for scenario file text that passes schema validation by default
#[derive(Debug, Clone)]
pub struct ScenarioFixture {
    id: String,
    fields: Vec<(ScenarioKey, Option<String>)>,
}

impl ScenarioFixture {
    /// Valid scenario `id`; `linked_nodes` still has to be set to a peer
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let bundle = |kind: &str, n: usize| {
            (1..=n)
                .map(|i| format!("echo {kind} {id} {i}"))
                .collect::<Vec<_>>()
                .join(" ||| ")
        };
        let fields = vec![
            (ScenarioKey::Id, Some(id.clone())),
            (ScenarioKey::OutcomeId, Some(format!("outcome-{id}"))),
            (ScenarioKey::CapabilityId, Some(format!("cap-{id}"))),
            (ScenarioKey::StabilityLayer, Some("core".to_string())),
            (ScenarioKey::DependsOn, Some(String::new())),
            (ScenarioKey::LinkedNodes, Some(String::new())),
            (ScenarioKey::ChangedPaths, Some(format!("src/{id}/**"))),
            (ScenarioKey::RedRun, Some(format!("echo red {id}"))),
            (ScenarioKey::ImplRun, Some(format!("echo impl {id}"))),
            (ScenarioKey::GreenRun, Some(format!("echo green {id}"))),
            (ScenarioKey::Verify, Some(format!("echo verify {id}"))),
            (ScenarioKey::UnitNormalTests, Some(bundle("unit_normal", 2))),
            (ScenarioKey::UnitBoundaryTests, Some(bundle("unit_boundary", 2))),
            (ScenarioKey::UnitFailureTests, Some(bundle("unit_failure", 2))),
            (ScenarioKey::BoundarySmokeTests, Some(bundle("smoke", 5))),
        ];
        Self { id, fields }
    }

    /// Fixtures for `ids`, each linked to the next one (wrapping around)
    #[must_use]
    pub fn ring(ids: &[&str]) -> Vec<Self> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Self::new(*id).linked_nodes(&[ids[(i + 1) % ids.len()]]))
            .collect()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace a field value verbatim (quotes included, if any)
    #[must_use]
    pub fn set(mut self, key: ScenarioKey, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = Some(value),
            None => self.fields.push((key, Some(value))),
        }
        self
    }

    /// Drop a field from the rendered text
    #[must_use]
    pub fn unset(mut self, key: ScenarioKey) -> Self {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = None;
        }
        self
    }

    #[must_use]
    pub fn depends_on(self, ids: &[&str]) -> Self {
        self.set(ScenarioKey::DependsOn, ids.join(","))
    }

    #[must_use]
    pub fn linked_nodes(self, ids: &[&str]) -> Self {
        self.set(ScenarioKey::LinkedNodes, ids.join(","))
    }

    #[must_use]
    pub fn changed_paths(self, globs: &[&str]) -> Self {
        self.set(ScenarioKey::ChangedPaths, globs.join(","))
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{SCENARIO_SUFFIX}", self.id)
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("# scenario {}\n", self.id);
        for (key, value) in &self.fields {
            if let Some(value) = value {
                out.push_str(&format!("{key}: {value}\n"));
            }
        }
        out
    }
}

/// Temporary project directory with the default runtime layout
pub struct TestProject {
    dir: TempDir,
    layout: ProjectLayout,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp project");
        let layout = ProjectLayout::new(dir.path(), RuntimeRoot::default());
        Self { dir, layout }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Write a fixture into the source scenario directory
    pub fn write_source(&self, fixture: &ScenarioFixture) -> PathBuf {
        self.write_source_raw(&fixture.file_name(), &fixture.render())
    }

    pub fn write_sources(&self, fixtures: &[ScenarioFixture]) -> Vec<PathBuf> {
        fixtures.iter().map(|f| self.write_source(f)).collect()
    }

    pub fn write_source_raw(&self, name: &str, content: &str) -> PathBuf {
        write(&self.layout.source_scenarios().join(name), content)
    }

    /// Write a pipeline document into the runtime pipelines directory
    pub fn write_pipeline(&self, name: &str, content: &str) -> PathBuf {
        write(&self.layout.pipelines_dir().join(name), content)
    }

    /// Write any project-relative file
    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        write(&self.root().join(rel), content)
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        let path = self.root().join(path);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

fn write(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(path, content).expect("write fixture file");
    path.to_path_buf()
}
