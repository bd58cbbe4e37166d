//! # Persistence Format
//!
//! Binary serialization for propgraph graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("PGRF")
//! - 1 byte: Version
//!
//! The whole graph state is persisted: tables with their id counters,
//! selection, log, registered actions and options. Decoded graphs are
//! validated before they are returned.
//!
//! ## Limits
//!
//! The payload size is checked against `MAX_PERSISTENCE_PAYLOAD_SIZE` and
//! the header is validated before any payload is decoded.

use crate::actions::GraphAction;
use crate::graph::GraphOptions;
use crate::log::LogEntry;
use crate::selection::Selection;
use crate::table::{EdgeRecord, EdgeTable, NodeRecord, NodeTable};
use crate::{Graph, GraphError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum allowed payload size for persistence format (500 MB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

/// Header size in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GraphError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GraphError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() < HEADER_SIZE {
            return Err(GraphError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZABLE GRAPH
// =============================================================================

/// Flat, serializable form of a [`Graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub options: GraphOptions,
    pub nodes: Vec<NodeRecord>,
    pub node_columns: Vec<String>,
    pub last_node: u64,
    pub edges: Vec<EdgeRecord>,
    pub edge_columns: Vec<String>,
    pub last_edge: u64,
    pub selection: Selection,
    pub log: Vec<LogEntry>,
    pub actions: Vec<GraphAction>,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            options: graph.options.clone(),
            nodes: graph.nodes.iter().cloned().collect(),
            node_columns: graph.nodes.columns().to_vec(),
            last_node: graph.nodes.last_id(),
            edges: graph.edges.iter().cloned().collect(),
            edge_columns: graph.edges.columns().to_vec(),
            last_edge: graph.edges.last_id(),
            selection: graph.selection.clone(),
            log: graph.log.entries().to_vec(),
            actions: graph.actions.actions().to_vec(),
        }
    }
}

impl TryFrom<SerializableGraph> for Graph {
    type Error = GraphError;

    fn try_from(sg: SerializableGraph) -> Result<Self, Self::Error> {
        let node_count = sg.nodes.len();
        let edge_count = sg.edges.len();
        let nodes = NodeTable::from_parts(sg.nodes, sg.node_columns, sg.last_node);
        let edges = EdgeTable::from_parts(sg.edges, sg.edge_columns, sg.last_edge);
        if nodes.len() != node_count || edges.len() != edge_count {
            return Err(GraphError::Validation("duplicate row ids".to_string()));
        }
        Graph::from_parts(nodes, edges, sg.selection, sg.log, sg.actions, sg.options)
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableGraph::from(graph);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| GraphError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize and validate a graph from bytes.
///
/// Size and header are checked before the payload is decoded.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, GraphError> {
    if bytes.len() < HEADER_SIZE {
        return Err(GraphError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(GraphError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let serializable: SerializableGraph =
        postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
            GraphError::SerializationError(format!("Failed to deserialize graph data: {}", e))
        })?;

    Graph::try_from(serializable)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{NodeMetric, Transform};
    use crate::algo::DegreeMode;
    use crate::expr::Expr;
    use crate::graph::{EdgeSpec, NodeSpec};
    use crate::selection::SetOp;
    use crate::Value;

    fn sample() -> Graph {
        Graph::with_options(GraphOptions {
            directed: false,
            name: Some("sample".to_string()),
        })
        .add_nodes(vec![
            NodeSpec::new().with_label("a").with_attr("w", 1.5),
            NodeSpec::new().with_label("b").with_type("t"),
        ])
        .expect("nodes")
        .add_edge(EdgeSpec::new("a", "b").with_rel("r").with_attr("n", 3))
        .expect("edge")
        .add_graph_action(
            Transform::SetNodeMetric {
                column: "deg".to_string(),
                metric: NodeMetric::Degree(DegreeMode::Total),
                directed: None,
            },
            Some("deg"),
        )
        .expect("action")
        .select_nodes(Some(&Expr::col("w").gt(Expr::lit(1))), SetOp::Union, None)
        .expect("select")
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample();
        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");
        assert_eq!(bytes1, bytes2, "save -> load -> save must produce identical bytes");
        assert_eq!(restored, graph);
        assert_eq!(restored.nodes().value(crate::NodeId(1), "w"), Some(Value::Float(1.5)));
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(GraphError::SerializationError(_))
        ));
    }

    #[test]
    fn malformed_graph_rejected() {
        let mut sg = SerializableGraph::from(&sample());
        sg.last_node = 0;
        let payload = postcard::to_stdvec(&sg).expect("encode");
        let mut bytes = PersistenceHeader::new().to_bytes().to_vec();
        bytes.extend_from_slice(&payload);
        assert!(matches!(graph_from_bytes(&bytes), Err(GraphError::Validation(_))));
    }
}
