//! Per-scenario expansion template
//!
//! For a scenario `S` the template emits, in order:
//!
//! ```text
//! S_red ─► S_impl ─┬─► S_unit_{normal,boundary,failure}_{1,2} ─┐
//!                  └───────────────────────────────────────────┴─► S_green ─► S_smoke_boundary_{1..5}
//! ```
//!
//! `S_red` also depends on `preflight` and on `D_green` for every
//! `depends_on` entry. Smoke nodes additionally depend on `L_green` for every
//! `linked_nodes` entry. The global `smoke_gate` collects every smoke node
//! and `e2e_gate` follows it.

use crate::catalog::Catalog;
use tdag_core::config::DEFAULT_SOURCE_DIR;
use tdag_core::pipeline::{global, node_type, DEFAULT_PIPELINE_ID};
use tdag_core::{Pipeline, PipelineNode, Scenario};

/// Override for the `smoke_gate` run command
pub const SMOKE_CMD_ENV: &str = "TDAG_SMOKE_CMD";
/// Override for the `e2e_gate` run command
pub const E2E_CMD_ENV: &str = "TDAG_E2E_CMD";
/// Override for the `preflight` run command
pub const PREFLIGHT_CMD_ENV: &str = "TDAG_PREFLIGHT_CMD";

/// Verify command for nodes whose run command is its own assertion
pub const TRIVIAL_VERIFY: &str = "true";

const DESCRIPTION: &str = "Generated from scenario catalog";

pub fn red_id(scenario: &str) -> String {
    format!("{scenario}_red")
}

pub fn impl_id(scenario: &str) -> String {
    format!("{scenario}_impl")
}

pub fn green_id(scenario: &str) -> String {
    format!("{scenario}_green")
}

/// Commands and change globs for the global nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTemplate {
    pub preflight_run: String,
    pub preflight_changed_paths: Vec<String>,
    pub smoke_run: String,
    pub e2e_run: String,
    pub gate_changed_paths: Vec<String>,
}

impl Default for PipelineTemplate {
    fn default() -> Self {
        Self {
            preflight_run: format!("test -d {DEFAULT_SOURCE_DIR}"),
            preflight_changed_paths: vec![".tdag/dag/**".to_string()],
            smoke_run: "scripts/test_smoke.sh".to_string(),
            e2e_run: "scripts/test_e2e.sh".to_string(),
            gate_changed_paths: vec![
                ".tdag/dag/pipelines/**".to_string(),
                ".tdag/dag/scenarios/**".to_string(),
            ],
        }
    }
}

impl PipelineTemplate {
    /// Defaults with the `TDAG_*_CMD` environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides taken from `lookup`; empty values are ignored
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut template = Self::default();
        if let Some(cmd) = get(PREFLIGHT_CMD_ENV) {
            template = template.with_preflight_run(cmd);
        }
        if let Some(cmd) = get(SMOKE_CMD_ENV) {
            template = template.with_smoke_run(cmd);
        }
        if let Some(cmd) = get(E2E_CMD_ENV) {
            template = template.with_e2e_run(cmd);
        }
        template
    }

    #[must_use]
    pub fn with_preflight_run(mut self, cmd: impl Into<String>) -> Self {
        self.preflight_run = cmd.into();
        self
    }

    #[must_use]
    pub fn with_smoke_run(mut self, cmd: impl Into<String>) -> Self {
        self.smoke_run = cmd.into();
        self
    }

    #[must_use]
    pub fn with_e2e_run(mut self, cmd: impl Into<String>) -> Self {
        self.e2e_run = cmd.into();
        self
    }

    /// Expand a validated catalog into the default pipeline
    #[must_use]
    pub fn expand(&self, catalog: &Catalog) -> Pipeline {
        let mut pipeline = Pipeline::new(DEFAULT_PIPELINE_ID).with_description(DESCRIPTION);
        pipeline.push(
            PipelineNode::new(global::PREFLIGHT, node_type::UTILITY, &self.preflight_run, TRIVIAL_VERIFY)
                .with_changed_paths(self.preflight_changed_paths.iter().cloned()),
        );

        let mut smoke_ids = Vec::new();
        for scenario in catalog.scenarios() {
            for node in scenario_nodes(scenario) {
                if node.node_type == node_type::SMOKE_BOUNDARY {
                    smoke_ids.push(node.id.clone());
                }
                pipeline.push(node);
            }
        }

        pipeline.push(
            PipelineNode::new(global::SMOKE_GATE, node_type::SMOKE, &self.smoke_run, TRIVIAL_VERIFY)
                .with_deps(smoke_ids)
                .with_changed_paths(self.gate_changed_paths.iter().cloned()),
        );
        pipeline.push(
            PipelineNode::new(global::E2E_GATE, node_type::E2E, &self.e2e_run, TRIVIAL_VERIFY)
                .with_deps([global::SMOKE_GATE])
                .with_changed_paths(self.gate_changed_paths.iter().cloned()),
        );
        pipeline
    }
}

/// The fifteen nodes generated for one scenario, in emission order
#[must_use]
pub fn scenario_nodes(scenario: &Scenario) -> Vec<PipelineNode> {
    let id = scenario.id.as_str();
    let paths = &scenario.changed_paths;
    let node = |node_id: String, kind: &str, run: &str, verify: &str, deps: Vec<String>| {
        PipelineNode::new(node_id, kind, run, verify)
            .with_deps(deps)
            .with_changed_paths(paths.iter().cloned())
    };

    let red = red_id(id);
    let implementation = impl_id(id);
    let green = green_id(id);
    let mut nodes = Vec::with_capacity(15);

    let red_deps: Vec<String> = std::iter::once(global::PREFLIGHT.to_string())
        .chain(scenario.depends_on.iter().map(|d| green_id(d)))
        .collect();
    nodes.push(node(red.clone(), node_type::TDD_RED, &scenario.red_run, &scenario.verify, red_deps));
    nodes.push(node(
        implementation.clone(),
        node_type::IMPL,
        &scenario.impl_run,
        &scenario.verify,
        vec![red],
    ));

    let bundles = [
        ("unit_normal", node_type::UNIT_NORMAL, &scenario.unit_normal_tests),
        ("unit_boundary", node_type::UNIT_BOUNDARY, &scenario.unit_boundary_tests),
        ("unit_failure", node_type::UNIT_FAILURE, &scenario.unit_failure_tests),
    ];
    let mut unit_ids = Vec::with_capacity(6);
    for (suffix, kind, commands) in bundles {
        for (i, cmd) in commands.iter().enumerate() {
            let unit = format!("{id}_{suffix}_{}", i + 1);
            unit_ids.push(unit.clone());
            nodes.push(node(unit, kind, cmd, TRIVIAL_VERIFY, vec![implementation.clone()]));
        }
    }

    let green_deps: Vec<String> = std::iter::once(implementation).chain(unit_ids).collect();
    nodes.push(node(
        green.clone(),
        node_type::TDD_GREEN,
        &scenario.green_run,
        &scenario.verify,
        green_deps,
    ));

    let smoke_deps: Vec<String> = std::iter::once(green)
        .chain(scenario.linked_nodes.iter().map(|l| green_id(l)))
        .collect();
    for (i, cmd) in scenario.boundary_smoke_tests.iter().enumerate() {
        nodes.push(node(
            format!("{id}_smoke_boundary_{}", i + 1),
            node_type::SMOKE_BOUNDARY,
            cmd,
            TRIVIAL_VERIFY,
            smoke_deps.clone(),
        ));
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tdag_core::ScenarioDocument;
    use tdag_test_utils::ScenarioFixture;

    fn scenario(fixture: &ScenarioFixture) -> Scenario {
        let file = PathBuf::from(fixture.file_name());
        let doc = ScenarioDocument::parse(&fixture.render(), &file).unwrap();
        Scenario::from_document(&doc, &file).unwrap()
    }

    fn catalog(fixtures: &[ScenarioFixture]) -> Catalog {
        Catalog::from_scenarios(fixtures.iter().map(scenario).collect()).unwrap()
    }

    #[test]
    fn red_depends_on_preflight_and_upstream_greens() {
        let fixtures = vec![
            ScenarioFixture::new("s").depends_on(&["a", "b"]).linked_nodes(&["a"]),
            ScenarioFixture::new("a").linked_nodes(&["b"]),
            ScenarioFixture::new("b").linked_nodes(&["a"]),
        ];
        let pipeline = PipelineTemplate::default().expand(&catalog(&fixtures));
        assert_eq!(
            pipeline.node("s_red").unwrap().deps,
            vec!["preflight", "a_green", "b_green"]
        );
    }

    #[test]
    fn green_depends_on_impl_and_six_units_only() {
        let nodes = scenario_nodes(&scenario(&ScenarioFixture::new("s").linked_nodes(&["x"])));
        let green = nodes.iter().find(|n| n.id == "s_green").unwrap();
        assert_eq!(
            green.deps,
            vec![
                "s_impl",
                "s_unit_normal_1",
                "s_unit_normal_2",
                "s_unit_boundary_1",
                "s_unit_boundary_2",
                "s_unit_failure_1",
                "s_unit_failure_2",
            ]
        );
        assert_eq!(green.node_type, node_type::TDD_GREEN);
    }

    #[test]
    fn smoke_nodes_depend_on_linked_greens() {
        let nodes = scenario_nodes(&scenario(&ScenarioFixture::new("s").linked_nodes(&["x", "y"])));
        let smoke: Vec<_> = nodes
            .iter()
            .filter(|n| n.node_type == node_type::SMOKE_BOUNDARY)
            .collect();
        assert_eq!(smoke.len(), 5);
        assert_eq!(smoke[4].id, "s_smoke_boundary_5");
        for node in smoke {
            assert_eq!(node.deps, vec!["s_green", "x_green", "y_green"]);
            assert_eq!(node.verify, TRIVIAL_VERIFY);
        }
    }

    #[test]
    fn expansion_shape_and_gates() {
        let pipeline = PipelineTemplate::default().expand(&catalog(&ScenarioFixture::ring(&["a", "b"])));
        assert_eq!(pipeline.pipeline_id, "default");
        assert_eq!(pipeline.nodes.len(), 1 + 2 * 15 + 2);
        assert_eq!(pipeline.nodes[0].id, "preflight");
        assert!(pipeline.nodes[0].deps.is_empty());

        let smoke_gate = pipeline.node("smoke_gate").unwrap();
        assert_eq!(smoke_gate.deps.len(), 10);
        assert!(smoke_gate.is_global_gate());
        let e2e = pipeline.nodes.last().unwrap();
        assert_eq!(e2e.id, "e2e_gate");
        assert_eq!(e2e.deps, vec!["smoke_gate"]);
        assert!(pipeline.check_references().is_ok());
    }

    #[test]
    fn scenario_globs_flow_into_every_node() {
        let nodes = scenario_nodes(&scenario(
            &ScenarioFixture::new("s")
                .linked_nodes(&["x"])
                .changed_paths(&["src/a/**", "docs/*.md"]),
        ));
        assert_eq!(nodes.len(), 15);
        assert!(nodes
            .iter()
            .all(|n| n.changed_paths == vec!["src/a/**", "docs/*.md"]));
    }

    #[test]
    fn env_overrides_gate_commands() {
        let template = PipelineTemplate::from_lookup(|key| match key {
            SMOKE_CMD_ENV => Some("make smoke".into()),
            E2E_CMD_ENV => Some("  ".into()),
            _ => None,
        });
        assert_eq!(template.smoke_run, "make smoke");
        assert_eq!(template.e2e_run, "scripts/test_e2e.sh");
    }

    #[test]
    fn rendered_pipeline_parses_back() {
        let fixtures = vec![
            ScenarioFixture::new("a")
                .linked_nodes(&["b"])
                .set(tdag_core::scenario::ScenarioKey::RedRun, r#""grep \"x y\" f""#),
            ScenarioFixture::new("b").linked_nodes(&["a"]),
        ];
        let pipeline = PipelineTemplate::default().expand(&catalog(&fixtures));
        let parsed = Pipeline::parse(&pipeline.render(), std::path::Path::new("p.yml")).unwrap();
        assert_eq!(parsed, pipeline);
        assert_eq!(parsed.node("a_red").unwrap().run, r#"grep "x y" f"#);
    }
}
