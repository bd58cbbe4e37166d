//! Tests for pipeline file parsing and the file-based commands.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use propgraph::cli::{
    PipelineFormat, TableKind, cmd_restore, cmd_run, cmd_show, parse_pipeline, read_graph,
    table_to_json, value_to_json, write_graph,
};
use propgraph_core::{
    Graph, GraphError, NodeId, NodeRef, RedbSnapshotStore, SetOp, Step, Value,
    pipeline::{OneOrMany, Scalar, TransformSpec},
};
use std::path::Path;
use tempfile::tempdir;

const CITIES: &str = r#"
[graph]
directed = true
name = "cities"

[[step]]
op = "add_node"
label = "paris"
type = "city"
attrs = { population = 2100000 }

[[step]]
op = "add_node"
label = "lyon"
type = "city"
attrs = { population = 520000 }

[[step]]
op = "add_edge"
from = "paris"
to = "lyon"
rel = "road"
attrs = { km = 465.5 }

[[step]]
op = "add_graph_action"
name = "deg"
transform = { kind = "degree", column = "deg" }

[[step]]
op = "add_edges_w_string"
edges = "2->1"

[[step]]
op = "select_nodes"
conditions = "population > 1000000"

[[step]]
op = "trav_out"
copy_attrs_from = "population"
copy_attrs_as = "inflow"
agg = "sum"
"#;

// =============================================================================
// PARSING TESTS
// =============================================================================

#[test]
fn test_toml_pipeline_parses() {
    let pipeline = parse_pipeline(CITIES, PipelineFormat::Toml).unwrap();

    assert_eq!(pipeline.graph.name.as_deref(), Some("cities"));
    assert_eq!(pipeline.steps.len(), 7);
    match &pipeline.steps[2] {
        Step::AddEdge { from, to, rel, .. } => {
            assert_eq!(from, &OneOrMany::One(NodeRef::Label("paris".to_string())));
            assert_eq!(to, &OneOrMany::One(NodeRef::Label("lyon".to_string())));
            assert_eq!(rel.as_deref(), Some("road"));
        }
        other => panic!("unexpected step {:?}", other),
    }
    match &pipeline.steps[3] {
        Step::AddGraphAction { transform, .. } => {
            assert!(matches!(transform, TransformSpec::Degree { .. }));
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[test]
fn test_json_pipeline_parses() {
    let json = r#"{
        "graph": { "directed": false },
        "step": [
            { "op": "add_n_nodes", "n": 2 },
            { "op": "add_edge", "from": [1], "to": 2 },
            { "op": "set_node_attrs", "nodes": [1, 2], "column": "w", "values": [1.5] }
        ]
    }"#;
    let pipeline = parse_pipeline(json, PipelineFormat::Json).unwrap();
    assert!(!pipeline.graph.directed);

    let graph = pipeline.run().unwrap();
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.nodes().value(NodeId(2), "w"), Some(Value::Float(1.5)));
}

#[test]
fn test_missing_graph_header_defaults_to_directed() {
    let pipeline = parse_pipeline("[[step]]\nop = \"add_n_nodes\"\nn = 1\n", PipelineFormat::Toml)
        .unwrap();
    assert!(pipeline.graph.directed);
    assert_eq!(pipeline.run().unwrap().node_count(), 1);
}

#[test]
fn test_unknown_op_is_serialization_error() {
    let result = parse_pipeline("[[step]]\nop = \"teleport\"\n", PipelineFormat::Toml);
    assert!(matches!(result, Err(GraphError::SerializationError(_))));
}

#[test]
fn test_scalars_are_untagged() {
    let step: Step =
        serde_json::from_str(r#"{"op": "set_node_attrs_ws", "column": "c", "value": "x"}"#)
            .unwrap();
    assert_eq!(
        step,
        Step::SetNodeAttrsWs {
            column: "c".to_string(),
            value: Scalar::Str("x".to_string()),
        }
    );
}

#[test]
fn test_multi_endpoint_add_edge_rejected_at_run() {
    let json = r#"{ "step": [
        { "op": "add_n_nodes", "n": 3 },
        { "op": "add_edge", "from": [1, 2], "to": 3 }
    ] }"#;
    let pipeline = parse_pipeline(json, PipelineFormat::Json).unwrap();
    assert!(matches!(pipeline.run(), Err(GraphError::Argument(_))));
}

#[test]
fn test_format_from_path() {
    assert_eq!(PipelineFormat::from_path(Path::new("a.json")), PipelineFormat::Json);
    assert_eq!(PipelineFormat::from_path(Path::new("a.toml")), PipelineFormat::Toml);
    assert_eq!(PipelineFormat::from_path(Path::new("pipeline")), PipelineFormat::Toml);
}

// =============================================================================
// RENDERING TESTS
// =============================================================================

#[test]
fn test_value_to_json() {
    assert_eq!(value_to_json(&Value::Missing), serde_json::Value::Null);
    assert_eq!(value_to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    assert_eq!(value_to_json(&Value::Int(3)), serde_json::json!(3));
    assert_eq!(value_to_json(&Value::from("a")), serde_json::json!("a"));
}

#[test]
fn test_table_to_json_keeps_column_order() {
    let graph = Graph::new()
        .add_n_nodes(1, Some("t"))
        .unwrap()
        .select_nodes_by_id(&[NodeId(1)], SetOp::Union)
        .unwrap()
        .set_node_attrs_ws("score", Value::Int(9))
        .unwrap();
    let json = table_to_json(&graph.get_node_table());
    let text = serde_json::to_string(&json).unwrap();
    assert_eq!(text, r#"[{"id":1,"type":"t","label":null,"score":9}]"#);
}

// =============================================================================
// COMMAND TESTS
// =============================================================================

#[test]
fn test_run_saves_graph_and_snapshots() {
    let dir = tempdir().unwrap();
    let pipeline_path = dir.path().join("cities.toml");
    let db_path = dir.path().join("runs.redb");
    let out_path = dir.path().join("cities.pgrf");
    std::fs::write(&pipeline_path, CITIES).unwrap();

    cmd_run(&pipeline_path, Some(&db_path), Some(&out_path), true).unwrap();

    let graph = read_graph(&out_path).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.nodes().value(NodeId(1), "deg"), Some(Value::Int(2)));
    assert_eq!(graph.get_selected_node_ids(), vec![NodeId(2)]);
    assert_eq!(graph.nodes().value(NodeId(2), "inflow"), Some(Value::Int(2_100_000)));

    // One snapshot per step; create_graph is version 1 and is not stored.
    let store = RedbSnapshotStore::open(&db_path).unwrap();
    assert_eq!(store.versions().unwrap(), (2..=8).collect::<Vec<u64>>());
}

#[test]
fn test_second_run_replaces_previous_snapshots() {
    let dir = tempdir().unwrap();
    let long_path = dir.path().join("cities.toml");
    let short_path = dir.path().join("short.toml");
    let db_path = dir.path().join("runs.redb");
    std::fs::write(&long_path, CITIES).unwrap();
    std::fs::write(&short_path, "[[step]]\nop = \"add_n_nodes\"\nn = 5\n").unwrap();

    cmd_run(&long_path, Some(&db_path), None, true).unwrap();
    cmd_run(&short_path, Some(&db_path), None, true).unwrap();

    let store = RedbSnapshotStore::open(&db_path).unwrap();
    assert_eq!(store.versions().unwrap(), vec![2]);
    assert_eq!(store.latest().unwrap().unwrap().node_count(), 5);
}

#[test]
fn test_restore_writes_requested_version() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("runs.redb");
    let out_path = dir.path().join("v2.pgrf");
    {
        let store = std::sync::Arc::new(RedbSnapshotStore::open(&db_path).unwrap());
        let _ = Graph::new()
            .with_snapshot_hook(store)
            .add_n_nodes(2, None)
            .unwrap()
            .add_n_nodes(1, None)
            .unwrap();
    }

    cmd_restore(&db_path, 2, &out_path).unwrap();
    assert_eq!(read_graph(&out_path).unwrap().node_count(), 2);

    let missing = cmd_restore(&db_path, 40, &out_path);
    assert!(matches!(missing, Err(GraphError::Reference(_))));
}

#[test]
fn test_show_rejects_non_graph_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.pgrf");
    std::fs::write(&path, b"not a graph").unwrap();
    assert!(cmd_show(&path, TableKind::Nodes, true).is_err());

    let good = dir.path().join("g.pgrf");
    write_graph(&Graph::new(), &good).unwrap();
    assert!(cmd_show(&good, TableKind::Edges, true).is_ok());
}
