//! Straight-line synthetic pipelines for executor scale testing

use tdag_core::error::{DagError, Result};
use tdag_core::pipeline::{node_type, SYNTHETIC_PREFIX};
use tdag_core::{Pipeline, PipelineNode};

const GLOB: &str = "synthetic/**";
const PREFLIGHT: &str = "synthetic_preflight";
const SMOKE_GATE: &str = "synthetic_smoke_gate";
const E2E_GATE: &str = "synthetic_e2e_gate";

/// Chain `synthetic_preflight → node_1 … node_N → smoke_gate → e2e_gate`
///
/// # Errors
/// Returns [`DagError::Usage`] when `count` is zero
pub fn synthetic_pipeline(count: usize) -> Result<Pipeline> {
    if count == 0 {
        return Err(DagError::usage(
            "--synthetic-nodes must be an integer >= 1 (got: 0)",
        ));
    }
    let mut pipeline = Pipeline::new(format!("{SYNTHETIC_PREFIX}{count}"))
        .with_description("Generated synthetic DAG pipeline for scale validation");
    let node = |id: &str, kind: &str, run: String, verify: String| {
        PipelineNode::new(id, kind, run, verify).with_changed_paths([GLOB])
    };

    pipeline.push(node(
        PREFLIGHT,
        node_type::UTILITY,
        "echo synthetic-preflight".into(),
        "echo synthetic-preflight-verify".into(),
    ));
    let mut previous = PREFLIGHT.to_string();
    for n in 1..=count {
        let id = format!("synthetic_node_{n}");
        pipeline.push(
            node(
                &id,
                node_type::SYNTHETIC,
                format!("echo run-{id}"),
                format!("echo verify-{id}"),
            )
            .with_deps([previous]),
        );
        previous = id;
    }
    pipeline.push(
        node(
            SMOKE_GATE,
            node_type::SMOKE,
            "echo synthetic-smoke".into(),
            "echo synthetic-smoke-verify".into(),
        )
        .with_deps([previous]),
    );
    pipeline.push(
        node(
            E2E_GATE,
            node_type::E2E,
            "echo synthetic-e2e".into(),
            "echo synthetic-e2e-verify".into(),
        )
        .with_deps([SMOKE_GATE]),
    );
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn five_nodes_make_eight() {
        let pipeline = synthetic_pipeline(5).unwrap();
        assert_eq!(pipeline.pipeline_id, "synthetic-5");
        assert!(pipeline.is_synthetic());
        let ids: Vec<_> = pipeline.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "synthetic_preflight",
                "synthetic_node_1",
                "synthetic_node_2",
                "synthetic_node_3",
                "synthetic_node_4",
                "synthetic_node_5",
                "synthetic_smoke_gate",
                "synthetic_e2e_gate",
            ]
        );
    }

    #[test]
    fn zero_is_rejected() {
        assert!(synthetic_pipeline(0).is_err());
    }

    #[test]
    fn synthetic_gates_are_not_global_gates() {
        let pipeline = synthetic_pipeline(1).unwrap();
        assert!(pipeline.nodes.iter().all(|n| !n.is_global_gate()));
    }

    proptest! {
        #[test]
        fn chain_is_linear(count in 1usize..200) {
            let pipeline = synthetic_pipeline(count).unwrap();
            prop_assert_eq!(pipeline.nodes.len(), count + 3);
            prop_assert!(pipeline.nodes[0].deps.is_empty());
            for pair in pipeline.nodes.windows(2) {
                prop_assert_eq!(&pair[1].deps, &vec![pair[0].id.clone()]);
            }
            prop_assert!(pipeline.nodes.iter().all(|n| n.changed_paths == vec![GLOB.to_string()]));
        }
    }
}
