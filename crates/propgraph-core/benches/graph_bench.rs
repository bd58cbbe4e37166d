//! # Graph Benchmarks
//!
//! Performance benchmarks for propgraph-core graph operations.
//!
//! Run with: `cargo bench -p propgraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use propgraph_core::{
    Aggregator, Graph, NodeId, NodeRef, NodeSpec, SetOp, TravOptions, graph_to_bytes,
};
use std::hint::black_box;

/// A graph with N nodes and edges between consecutive nodes.
fn create_linear_graph(size: usize) -> Graph {
    let from: Vec<NodeRef> = (1..size as u64).map(NodeRef::from).collect();
    let to: Vec<NodeRef> = (2..=size as u64).map(NodeRef::from).collect();
    Graph::new()
        .add_n_nodes(size, None)
        .expect("nodes")
        .add_edges(&from, &to, None)
        .expect("edges")
}

/// A graph with N nodes and edges from node 1 to all others.
fn create_star_graph(size: usize) -> Graph {
    let from: Vec<NodeRef> = vec![NodeRef::from(1u64); size - 1];
    let to: Vec<NodeRef> = (2..=size as u64).map(NodeRef::from).collect();
    Graph::new()
        .add_nodes((0..size).map(|_| NodeSpec::new().with_attr("w", 1)).collect())
        .expect("nodes")
        .add_edges(&from, &to, None)
        .expect("edges")
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_node_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insertion");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(Graph::new().add_n_nodes(size, None)));
        });
    }

    group.finish();
}

fn bench_edge_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_insertion");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_linear_graph(size)));
        });
    }

    group.finish();
}

fn bench_chained_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("chained_ops");

    for size in [100, 1000].iter() {
        let graph = create_linear_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.add_n_nodes(1, None)));
        });
    }

    group.finish();
}

fn bench_traverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("traverse");

    for size in [100, 500, 1000].iter() {
        let graph = create_linear_graph(*size)
            .select_nodes_by_id(&[NodeId(1)], SetOp::Union)
            .expect("select");

        group.bench_with_input(BenchmarkId::new("hops_10", size), &10, |b, &hops| {
            b.iter(|| {
                let mut g = graph.clone();
                for _ in 0..hops {
                    g = g.trav_out(&TravOptions::new()).expect("trav");
                }
                black_box(g)
            });
        });
    }

    group.finish();
}

fn bench_aggregated_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregated_copy");

    for size in [100, 500, 1000].iter() {
        let graph = create_star_graph(*size)
            .select_nodes(None, SetOp::Union, None)
            .expect("select");
        let opts = TravOptions::new()
            .copy_attrs("w", Aggregator::Sum)
            .copy_attrs_as("w_sum");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.trav_in(&opts)));
        });
    }

    group.finish();
}

fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_to_bytes");

    for size in [100, 500, 1000].iter() {
        let graph = create_linear_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph_to_bytes(&graph)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_node_insertion,
    bench_edge_insertion,
    bench_chained_ops,
    bench_traverse,
    bench_aggregated_copy,
    bench_persistence,
);

criterion_main!(benches);
