//! # Algorithm Engine Boundary
//!
//! Graph algorithms are not implemented here. [`Graph::to_algorithm_graph`]
//! hands the current tables to `petgraph` as a [`StableDiGraph`] whose node
//! weights are node ids and whose edge weights are edge ids. Results come
//! back as maps keyed by node id and are merged into the node table with
//! `join_node_attrs`.
//!
//! Edges whose endpoints were deleted (dangling after a non-cascading
//! `delete_node`) are left out of the algorithm graph.

use crate::graph::Graph;
use crate::{EdgeId, GraphError, NodeId, Value};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::NodeIndexable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Which incident edges a degree counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeMode {
    In,
    Out,
    #[default]
    Total,
}

impl FromStr for DegreeMode {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "total" | "all" => Ok(Self::Total),
            other => Err(GraphError::Argument(format!(
                "unknown degree mode `{}` (expected in, out or total)",
                other
            ))),
        }
    }
}

/// A read-only handle for running `petgraph` algorithms.
#[derive(Debug, Clone)]
pub struct AlgoGraph {
    graph: StableDiGraph<NodeId, EdgeId>,
    directed: bool,
    node_index: BTreeMap<NodeId, NodeIndex>,
}

impl AlgoGraph {
    /// The underlying petgraph graph.
    #[must_use]
    pub fn inner(&self) -> &StableDiGraph<NodeId, EdgeId> {
        &self.graph
    }

    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    #[must_use]
    pub fn node_index(&self, id: NodeId) -> Option<NodeIndex> {
        self.node_index.get(&id).copied()
    }

    #[must_use]
    pub fn node_id(&self, index: NodeIndex) -> Option<NodeId> {
        self.graph.node_weight(index).copied()
    }

    /// Degree of every node. Undirected graphs always count both directions.
    /// A self-loop counts twice toward the total.
    #[must_use]
    pub fn degree(&self, mode: DegreeMode) -> BTreeMap<NodeId, Value> {
        let mode = if self.directed { mode } else { DegreeMode::Total };
        self.node_index
            .iter()
            .map(|(id, idx)| {
                let incoming = self.graph.edges_directed(*idx, Direction::Incoming).count();
                let outgoing = self.graph.edges_directed(*idx, Direction::Outgoing).count();
                let degree = match mode {
                    DegreeMode::In => incoming,
                    DegreeMode::Out => outgoing,
                    DegreeMode::Total => incoming + outgoing,
                };
                (*id, Value::Int(degree as i64))
            })
            .collect()
    }

    /// Weakly-connected component of every node, numbered `1..=k` in order
    /// of each component's smallest node id.
    #[must_use]
    pub fn weak_components(&self) -> BTreeMap<NodeId, Value> {
        let mut sets = UnionFind::<usize>::new(self.graph.node_bound());
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                sets.union(a.index(), b.index());
            }
        }
        let mut labels: BTreeMap<usize, i64> = BTreeMap::new();
        self.node_index
            .iter()
            .map(|(id, idx)| {
                let root = sets.find(idx.index());
                let next = labels.len() as i64 + 1;
                let label = *labels.entry(root).or_insert(next);
                (*id, Value::Int(label))
            })
            .collect()
    }
}

impl Graph {
    /// Build the algorithm-engine view of this graph.
    ///
    /// `directed` overrides the graph's own directedness when given.
    #[must_use]
    pub fn to_algorithm_graph(&self, directed: Option<bool>) -> AlgoGraph {
        let mut graph = StableDiGraph::with_capacity(self.nodes().len(), self.edges().len());
        let mut node_index = BTreeMap::new();
        for id in self.nodes().ids() {
            node_index.insert(id, graph.add_node(id));
        }
        for edge in self.edges().iter() {
            if let (Some(a), Some(b)) = (node_index.get(&edge.from), node_index.get(&edge.to)) {
                graph.add_edge(*a, *b, edge.id);
            }
        }
        AlgoGraph {
            graph,
            directed: directed.unwrap_or(self.options().directed),
            node_index,
        }
    }
}
