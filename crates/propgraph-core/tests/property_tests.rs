//! # Property-Based Tests
//!
//! Invariants that must hold after any sequence of graph operations.

use propgraph_core::{
    Aggregator, Assignment, EdgeId, EdgeSpec, Graph, NodeId, SetOp, TravOptions, Value,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// A small vocabulary of operations; failing ones are simply skipped.
#[derive(Debug, Clone)]
enum Op {
    AddNodes(usize),
    AddEdge(u64, u64),
    DeleteNode(u64),
    DeleteNodeCascade(u64),
    DeleteEdge(u64),
    SelectNodes(Vec<u64>),
    SelectEdges(Vec<u64>),
    TravOut,
    TravOutEdge,
    TravInNode,
    Invert,
    Clear,
    SetWeight(u64, i64),
    MutateWeight(usize),
    TravOutSum,
}

/// Integer expressions over `w` that overflow for extreme inputs.
const WEIGHT_EXPRS: [&str; 8] = [
    "w %% -1",
    "w %% 0",
    "w * w",
    "w + w",
    "w - 1",
    "-w",
    "abs(w)",
    "w / -1",
];

fn extreme_i64() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(i64::MIN),
        Just(i64::MAX),
        Just(-1i64),
        Just(0i64),
        any::<i64>(),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..4).prop_map(Op::AddNodes),
        (1u64..12, 1u64..12).prop_map(|(a, b)| Op::AddEdge(a, b)),
        (1u64..12).prop_map(Op::DeleteNode),
        (1u64..12).prop_map(Op::DeleteNodeCascade),
        (1u64..12).prop_map(Op::DeleteEdge),
        vec(1u64..12, 1..4).prop_map(Op::SelectNodes),
        vec(1u64..12, 1..4).prop_map(Op::SelectEdges),
        Just(Op::TravOut),
        Just(Op::TravOutEdge),
        Just(Op::TravInNode),
        Just(Op::Invert),
        Just(Op::Clear),
        (1u64..12, extreme_i64()).prop_map(|(n, w)| Op::SetWeight(n, w)),
        (0..WEIGHT_EXPRS.len()).prop_map(Op::MutateWeight),
        Just(Op::TravOutSum),
    ]
}

fn apply(g: &Graph, op: &Op) -> Option<Graph> {
    let result = match op {
        Op::AddNodes(n) => g.add_n_nodes(*n, None),
        Op::AddEdge(a, b) => g.add_edge(EdgeSpec::new(*a, *b)),
        Op::DeleteNode(n) => g.delete_node(*n),
        Op::DeleteNodeCascade(n) => g.delete_node_cascade(*n),
        Op::DeleteEdge(e) => g.delete_edge(EdgeId(*e)),
        Op::SelectNodes(ids) => {
            let ids: Vec<NodeId> = ids.iter().copied().map(NodeId).collect();
            g.select_nodes_by_id(&ids, SetOp::Union)
        }
        Op::SelectEdges(ids) => {
            let ids: Vec<EdgeId> = ids.iter().copied().map(EdgeId).collect();
            g.select_edges_by_edge_id(&ids, SetOp::Union)
        }
        Op::TravOut => g.trav_out(&TravOptions::new()),
        Op::TravOutEdge => g.trav_out_edge(&TravOptions::new()),
        Op::TravInNode => g.trav_in_node(&TravOptions::new()),
        Op::Invert => g.invert_selection(),
        Op::Clear => g.clear_selection(),
        Op::SetWeight(n, w) => g.set_node_attrs(&[NodeId(*n)], "w", &[Value::Int(*w)]),
        Op::MutateWeight(i) => Assignment::parse("w", WEIGHT_EXPRS[*i])
            .and_then(|a| g.mutate_node_attrs(&[a])),
        Op::TravOutSum => g.trav_out(&TravOptions::new().copy_attrs("w", Aggregator::Sum)),
    };
    result.ok()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Ids are unique, counters never decrease and stay >= the max id,
    /// selections are exclusive and log versions are exactly 1..N.
    #[test]
    fn invariants_hold_after_any_sequence(ops in vec(op_strategy(), 1..40)) {
        let mut g = Graph::new();
        let (mut last_node, mut last_edge) = (0u64, 0u64);

        for op in &ops {
            let before = g.get_graph_log().len();
            match apply(&g, op) {
                Some(next) => g = next,
                None => {
                    // A failed operation leaves nothing behind.
                    prop_assert_eq!(g.get_graph_log().len(), before);
                    continue;
                }
            }

            let node_ids: Vec<NodeId> = g.nodes().ids().collect();
            let unique: BTreeSet<NodeId> = node_ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), node_ids.len());
            let edge_ids: Vec<EdgeId> = g.edges().ids().collect();
            let unique: BTreeSet<EdgeId> = edge_ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), edge_ids.len());

            prop_assert!(g.last_node() >= last_node);
            prop_assert!(g.last_edge() >= last_edge);
            prop_assert!(node_ids.iter().all(|id| id.0 <= g.last_node()));
            prop_assert!(edge_ids.iter().all(|id| id.0 <= g.last_edge()));
            last_node = g.last_node();
            last_edge = g.last_edge();

            prop_assert!(
                g.get_selected_node_ids().is_empty() || g.get_selected_edge_ids().is_empty()
            );

            let versions: Vec<u64> =
                g.get_graph_log().entries().iter().map(|e| e.version_id).collect();
            let expected: Vec<u64> = (1..=versions.len() as u64).collect();
            prop_assert_eq!(versions, expected);

            prop_assert!(g.validate().is_ok());
        }
    }

    /// Integer expressions evaluate to a value for every `i64`, extremes included.
    #[test]
    fn extreme_integers_never_panic(w in extreme_i64(), i in 0..WEIGHT_EXPRS.len()) {
        let g = Graph::new()
            .add_n_nodes(1, None)
            .expect("node")
            .set_node_attrs(&[NodeId(1)], "w", &[Value::Int(w)])
            .expect("w");
        let assignment = Assignment::parse("y", WEIGHT_EXPRS[i]).expect("parse");
        let result = g.mutate_node_attrs(&[assignment]);
        prop_assert!(result.is_ok(), "{} with w = {}: {:?}", WEIGHT_EXPRS[i], w, result.err());
    }

    /// The same operations produce the same graph.
    #[test]
    fn operations_are_deterministic(ops in vec(op_strategy(), 1..30)) {
        let run = || {
            let mut g = Graph::new();
            for op in &ops {
                if let Some(next) = apply(&g, op) {
                    g = next;
                }
            }
            g
        };
        let (a, b) = (run(), run());
        prop_assert_eq!(a.get_node_table(), b.get_node_table());
        prop_assert_eq!(a.get_edge_table(), b.get_edge_table());
        prop_assert_eq!(a.get_selection(), b.get_selection());
    }

    /// The input graph of an operation is never modified.
    #[test]
    fn inputs_are_never_mutated(ops in vec(op_strategy(), 1..20), extra in op_strategy()) {
        let mut g = Graph::new();
        for op in &ops {
            if let Some(next) = apply(&g, op) {
                g = next;
            }
        }
        let frozen = g.clone();
        let _ = apply(&g, &extra);
        prop_assert_eq!(g, frozen);
    }
}
