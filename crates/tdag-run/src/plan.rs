//! Node selection and topological scheduling
//!
//! A [`Plan`] holds one [`NodeRecord`] per pipeline node, keyed by id and
//! kept in definition order. Selection marks records pending; scheduling
//! walks the selected subgraph with Kahn's algorithm in passes over the
//! definition order, so ties always break toward the earlier node.

use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use tdag_core::error::{DagError, Result};
use tdag_core::{GlobSet, Pipeline, PipelineNode};

/// Per-node lifecycle: `Unselected → Pending → Passed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unselected,
    Pending,
    Passed,
    Failed,
}

impl NodeState {
    #[must_use]
    pub fn is_selected(self) -> bool {
        self != Self::Unselected
    }
}

/// How nodes are chosen for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Exactly one node, no closure
    Only(String),
    /// Nodes whose globs match a changed file, closed forward then backward
    Changed {
        files: Vec<String>,
        include_global_gates: bool,
    },
}

#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub node: PipelineNode,
    pub state: NodeState,
}

/// Execution order for the selected subgraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub order: Vec<String>,
    /// Selected nodes that never reached in-degree zero (cycle members or
    /// nodes downstream of one)
    pub unresolved: Vec<String>,
}

impl Schedule {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    records: IndexMap<String, NodeRecord>,
}

impl Plan {
    /// All nodes unselected
    #[must_use]
    pub fn new(pipeline: &Pipeline) -> Self {
        let records = pipeline
            .nodes
            .iter()
            .map(|node| {
                (
                    node.id.clone(),
                    NodeRecord {
                        node: node.clone(),
                        state: NodeState::Unselected,
                    },
                )
            })
            .collect();
        Self { records }
    }

    /// Apply a selection mode
    ///
    /// # Errors
    /// Returns a usage error if `Selection::Only` names an unknown node
    pub fn select(&mut self, selection: &Selection) -> Result<()> {
        match selection {
            Selection::All => {
                for record in self.records.values_mut() {
                    record.state = NodeState::Pending;
                }
            }
            Selection::Only(id) => {
                let record = self
                    .records
                    .get_mut(id)
                    .ok_or_else(|| DagError::usage(format!("--only node not found: {id}")))?;
                record.state = NodeState::Pending;
            }
            Selection::Changed {
                files,
                include_global_gates,
            } => {
                for record in self.records.values_mut() {
                    if GlobSet::new(&record.node.changed_paths).matches_any(files) {
                        record.state = NodeState::Pending;
                    }
                }
                self.close_forward(*include_global_gates);
                self.close_backward();
            }
        }
        Ok(())
    }

    /// Select every dependent of a selected node; global gates only when
    /// `include_global_gates` is set
    pub fn close_forward(&mut self, include_global_gates: bool) {
        let mut dependents: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, record) in self.records.values().enumerate() {
            for dep in &record.node.deps {
                dependents.entry(dep.as_str()).or_default().push(index);
            }
        }
        let mut queue: VecDeque<usize> = self.selected_indices().collect();
        let mut newly = Vec::new();
        let mut selected: Vec<bool> = self.records.values().map(|r| r.state.is_selected()).collect();
        while let Some(index) = queue.pop_front() {
            let id = self.records[index].node.id.as_str();
            for &dependent in dependents.get(id).map_or(&[][..], Vec::as_slice) {
                let node = &self.records[dependent].node;
                if selected[dependent] || (!include_global_gates && node.is_global_gate()) {
                    continue;
                }
                selected[dependent] = true;
                newly.push(dependent);
                queue.push_back(dependent);
            }
        }
        for index in newly {
            self.records[index].state = NodeState::Pending;
        }
    }

    /// Select every transitive dependency of a selected node
    pub fn close_backward(&mut self) {
        let mut queue: VecDeque<usize> = self.selected_indices().collect();
        while let Some(index) = queue.pop_front() {
            let deps = self.records[index].node.deps.clone();
            for dep in deps {
                if let Some((dep_index, _, record)) = self.records.get_full_mut(&dep) {
                    if !record.state.is_selected() {
                        record.state = NodeState::Pending;
                        queue.push_back(dep_index);
                    }
                }
            }
        }
    }

    /// Kahn order over the selected subgraph
    ///
    /// In-degree counts only edges whose endpoints are both selected. Each
    /// pass scans nodes in definition order and takes every ready node;
    /// a pass with no progress ends scheduling and the remainder is
    /// reported as unresolved.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        let selected: Vec<bool> = self.records.values().map(|r| r.state.is_selected()).collect();
        let mut indegree = vec![0usize; self.records.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.records.len()];
        for (index, record) in self.records.values().enumerate() {
            if !selected[index] {
                continue;
            }
            for dep in &record.node.deps {
                if let Some(dep_index) = self.records.get_index_of(dep) {
                    if selected[dep_index] {
                        indegree[index] += 1;
                        dependents[dep_index].push(index);
                    }
                }
            }
        }

        let total = selected.iter().filter(|s| **s).count();
        let mut processed = vec![false; self.records.len()];
        let mut order = Vec::with_capacity(total);
        while order.len() < total {
            let mut progress = false;
            for index in 0..self.records.len() {
                if !selected[index] || processed[index] || indegree[index] != 0 {
                    continue;
                }
                progress = true;
                processed[index] = true;
                order.push(self.records[index].node.id.clone());
                for &dependent in &dependents[index] {
                    indegree[dependent] -= 1;
                }
            }
            if !progress {
                break;
            }
        }

        let unresolved = self
            .records
            .values()
            .enumerate()
            .filter(|(index, _)| selected[*index] && !processed[*index])
            .map(|(_, record)| record.node.id.clone())
            .collect();
        Schedule { order, unresolved }
    }

    fn selected_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.records
            .values()
            .enumerate()
            .filter(|(_, r)| r.state.is_selected())
            .map(|(index, _)| index)
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected_indices().count()
    }

    /// Selected node ids in definition order
    #[must_use]
    pub fn selected_ids(&self) -> Vec<&str> {
        self.records
            .values()
            .filter(|r| r.state.is_selected())
            .map(|r| r.node.id.as_str())
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.records.get(id)
    }

    /// Position of a node in definition order
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.records.get_index_of(id)
    }

    pub fn set_state(&mut self, id: &str, state: NodeState) {
        if let Some(record) = self.records.get_mut(id) {
            record.state = state;
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.values()
    }
}
