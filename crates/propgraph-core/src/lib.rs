//! # propgraph-core
//!
//! The chained property-graph engine for propgraph - THE LOGIC.
//!
//! A graph is a node table, an edge table, one active selection, a
//! versioned action log and a registry of graph actions. Every operation
//! reads a graph and returns a new one, so calls chain:
//!
//! ```
//! use propgraph_core::{Graph, NodeId, SetOp, TravOptions};
//!
//! let g = Graph::new()
//!     .add_n_nodes(3, Some("city"))
//!     .and_then(|g| g.add_edges_w_string("1->2 2->3", None))
//!     .and_then(|g| g.select_nodes_by_id(&[NodeId(1)], SetOp::Union))
//!     .and_then(|g| g.trav_out(&TravOptions::new()))
//!     .expect("chain");
//! assert_eq!(g.get_selected_node_ids(), vec![NodeId(2)]);
//! ```
//!
//! ## Architectural Constraints
//!
//! - Copy-on-write: the input graph of an operation is never modified
//! - Deterministic: BTreeMap/BTreeSet only, no randomness
//! - Ids are monotonic per table and never reused
//! - One log entry per top-level operation, composites included
//! - Graph actions are data, replayed after edge-count changes
//! - NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod actions;
pub mod algo;
pub mod attrs;
pub mod expr;
pub mod formats;
pub mod graph;
pub mod log;
pub mod pipeline;
pub mod primitives;
pub mod select;
pub mod selection;
pub mod storage;
pub mod table;
pub mod traverse;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EdgeId, ErrorKind, GraphError, NodeId, NodeRef, Value};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use actions::{ActionRegistry, ActionSelector, Assignment, GraphAction, NodeMetric, Transform};
pub use algo::{AlgoGraph, DegreeMode};
pub use expr::{Expr, RowAccess};
pub use graph::{EdgeSpec, Graph, GraphOptions, NodeSpec};
pub use log::{ActionLog, LogEntry};
pub use pipeline::{Pipeline, PipelineGraph, Step};
pub use selection::{EdgeSelection, Selection, SetOp};
pub use table::{EdgeRecord, EdgeTable, NodeRecord, NodeTable, TableSnapshot};
pub use traverse::{Aggregator, TravOptions};

// =============================================================================
// RE-EXPORTS: Formats & Storage
// =============================================================================

pub use formats::{PersistenceHeader, SerializableGraph, graph_from_bytes, graph_to_bytes};
pub use storage::{MemorySnapshotStore, RedbSnapshotStore, SnapshotHook};
