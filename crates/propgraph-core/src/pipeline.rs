//! # Declarative Pipelines
//!
//! A pipeline is a graph header plus an ordered list of [`Step`]s, each
//! naming one graph operation and its arguments. Pipelines are plain serde
//! data; the binary reads them from TOML or JSON:
//!
//! ```toml
//! [graph]
//! directed = true
//!
//! [[step]]
//! op = "add_n_nodes"
//! n = 3
//! type = "city"
//!
//! [[step]]
//! op = "add_edges_w_string"
//! edges = "1->2 2->3"
//! ```
//!
//! Expressions are written as strings and parsed when the step runs.
//! Running a pipeline stops at the first failing step.

use crate::actions::{ActionSelector, Assignment, NodeMetric, Transform};
use crate::algo::DegreeMode;
use crate::expr::Expr;
use crate::graph::{EdgeSpec, Graph, GraphOptions, NodeSpec};
use crate::selection::SetOp;
use crate::traverse::{Aggregator, TravOptions};
use crate::{EdgeId, GraphError, NodeId, NodeRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SCALARS
// =============================================================================

/// A literal cell value as written in a pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Float(x) => Value::Float(x),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

/// A single item or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// The single item; a list must hold exactly one element.
    fn into_single(self, what: &str) -> Result<T, GraphError> {
        match self {
            Self::One(item) => Ok(item),
            Self::Many(mut items) if items.len() == 1 => items
                .pop()
                .ok_or_else(|| GraphError::Argument(format!("empty `{}`", what))),
            Self::Many(items) => Err(GraphError::Argument(format!(
                "add_edge takes a single `{}` node, got {}",
                what,
                items.len()
            ))),
        }
    }
}

/// `target = expr` with the expression still in source form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSpec {
    pub target: String,
    pub expr: String,
}

fn parse_assignments(specs: &[AssignmentSpec]) -> Result<Vec<Assignment>, GraphError> {
    specs
        .iter()
        .map(|a| Assignment::parse(a.target.clone(), &a.expr))
        .collect()
}

fn parse_conditions(src: Option<&str>) -> Result<Option<Expr>, GraphError> {
    src.map(Expr::parse).transpose()
}

fn attrs(map: &BTreeMap<String, Scalar>) -> Vec<(String, Value)> {
    map.iter()
        .map(|(k, v)| (k.clone(), Value::from(v.clone())))
        .collect()
}

fn node_ids(ids: &[u64]) -> Vec<NodeId> {
    ids.iter().copied().map(NodeId).collect()
}

fn edge_ids(ids: &[u64]) -> Vec<EdgeId> {
    ids.iter().copied().map(EdgeId).collect()
}

// =============================================================================
// TRAVERSAL & ACTION ARGUMENTS
// =============================================================================

/// Arguments shared by the traversal steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravSpec {
    pub conditions: Option<String>,
    pub copy_attrs_from: Option<String>,
    pub copy_attrs_as: Option<String>,
    /// One of `sum`, `min`, `max`, `mean`, `median`; defaults to `sum`.
    pub agg: Option<String>,
}

impl TravSpec {
    pub fn to_options(&self) -> Result<TravOptions, GraphError> {
        Ok(TravOptions {
            conditions: parse_conditions(self.conditions.as_deref())?,
            copy_attrs_from: self.copy_attrs_from.clone(),
            copy_attrs_as: self.copy_attrs_as.clone(),
            agg: self
                .agg
                .as_deref()
                .map(str::parse::<Aggregator>)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

/// A graph action as written in a pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    MutateNodeAttrs { assignments: Vec<AssignmentSpec> },
    MutateEdgeAttrs { assignments: Vec<AssignmentSpec> },
    SetNodeAttr { column: String, value: Scalar },
    SetEdgeAttr { column: String, value: Scalar },
    Degree {
        column: String,
        #[serde(default)]
        mode: DegreeMode,
        #[serde(default)]
        directed: Option<bool>,
    },
    WeakComponent {
        column: String,
        #[serde(default)]
        directed: Option<bool>,
    },
    CopyNodeAttrs { from: String, to: String },
    DropNodeAttrs { columns: Vec<String> },
    ClearSelection,
}

impl TransformSpec {
    pub fn to_transform(&self) -> Result<Transform, GraphError> {
        Ok(match self {
            Self::MutateNodeAttrs { assignments } => {
                Transform::MutateNodeAttrs(parse_assignments(assignments)?)
            }
            Self::MutateEdgeAttrs { assignments } => {
                Transform::MutateEdgeAttrs(parse_assignments(assignments)?)
            }
            Self::SetNodeAttr { column, value } => Transform::SetNodeAttr {
                column: column.clone(),
                value: value.clone().into(),
            },
            Self::SetEdgeAttr { column, value } => Transform::SetEdgeAttr {
                column: column.clone(),
                value: value.clone().into(),
            },
            Self::Degree {
                column,
                mode,
                directed,
            } => Transform::SetNodeMetric {
                column: column.clone(),
                metric: NodeMetric::Degree(*mode),
                directed: *directed,
            },
            Self::WeakComponent { column, directed } => Transform::SetNodeMetric {
                column: column.clone(),
                metric: NodeMetric::WeakComponent,
                directed: *directed,
            },
            Self::CopyNodeAttrs { from, to } => Transform::CopyNodeAttrs {
                from: from.clone(),
                to: to.clone(),
            },
            Self::DropNodeAttrs { columns } => Transform::DropNodeAttrs(columns.clone()),
            Self::ClearSelection => Transform::ClearSelection,
        })
    }
}

// =============================================================================
// STEPS
// =============================================================================

/// One graph operation with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetGraphDirected {
        directed: bool,
    },
    SetGraphName {
        name: String,
    },
    AddNode {
        #[serde(default, rename = "type")]
        node_type: Option<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        attrs: BTreeMap<String, Scalar>,
    },
    AddNNodes {
        n: usize,
        #[serde(default, rename = "type")]
        node_type: Option<String>,
    },
    AddNodeClone {
        node: NodeRef,
        #[serde(default)]
        label: Option<String>,
    },
    DeleteNode {
        node: NodeRef,
        #[serde(default)]
        cascade: bool,
    },
    DeleteNodesWs,
    AddEdge {
        from: OneOrMany<NodeRef>,
        to: OneOrMany<NodeRef>,
        #[serde(default)]
        rel: Option<String>,
        #[serde(default)]
        attrs: BTreeMap<String, Scalar>,
    },
    AddEdges {
        from: Vec<NodeRef>,
        to: Vec<NodeRef>,
        #[serde(default)]
        rel: Option<String>,
    },
    AddEdgesWString {
        edges: String,
        #[serde(default)]
        rel: Option<String>,
    },
    AddEdgeClone {
        edge: u64,
        from: NodeRef,
        to: NodeRef,
    },
    DeleteEdge {
        edge: u64,
    },
    DeleteEdgesWs,
    SetNodeAttrs {
        nodes: Vec<u64>,
        column: String,
        values: Vec<Scalar>,
    },
    SetEdgeAttrs {
        edges: Vec<u64>,
        column: String,
        values: Vec<Scalar>,
    },
    SetNodeAttrsWs {
        column: String,
        value: Scalar,
    },
    SetEdgeAttrsWs {
        column: String,
        value: Scalar,
    },
    MutateNodeAttrs {
        assignments: Vec<AssignmentSpec>,
    },
    MutateEdgeAttrs {
        assignments: Vec<AssignmentSpec>,
    },
    MutateNodeAttrsWs {
        assignments: Vec<AssignmentSpec>,
    },
    MutateEdgeAttrsWs {
        assignments: Vec<AssignmentSpec>,
    },
    DropNodeAttrs {
        columns: Vec<String>,
    },
    DropEdgeAttrs {
        columns: Vec<String>,
    },
    RenameNodeAttrs {
        from: String,
        to: String,
    },
    RenameEdgeAttrs {
        from: String,
        to: String,
    },
    CopyNodeAttrs {
        from: String,
        to: String,
    },
    CopyEdgeAttrs {
        from: String,
        to: String,
    },
    SelectNodes {
        #[serde(default)]
        conditions: Option<String>,
        #[serde(default)]
        set_op: SetOp,
        #[serde(default)]
        nodes: Option<Vec<u64>>,
    },
    SelectEdges {
        #[serde(default)]
        conditions: Option<String>,
        #[serde(default)]
        set_op: SetOp,
        #[serde(default)]
        edges: Option<Vec<u64>>,
    },
    SelectNodesById {
        nodes: Vec<u64>,
        #[serde(default)]
        set_op: SetOp,
    },
    SelectEdgesByEdgeId {
        edges: Vec<u64>,
        #[serde(default)]
        set_op: SetOp,
    },
    SelectEdgesByNodeId {
        nodes: Vec<u64>,
        #[serde(default)]
        set_op: SetOp,
    },
    SelectNodesByDegree {
        expressions: String,
        #[serde(default)]
        set_op: SetOp,
    },
    SelectLastNodesCreated,
    SelectLastEdgesCreated,
    InvertSelection,
    ClearSelection,
    TravOut(TravSpec),
    TravIn(TravSpec),
    TravBoth(TravSpec),
    TravOutEdge(TravSpec),
    TravInEdge(TravSpec),
    TravBothEdge(TravSpec),
    TravOutNode(TravSpec),
    TravInNode(TravSpec),
    TravReverseEdge {
        #[serde(default)]
        conditions: Option<String>,
        #[serde(default)]
        add_to_selection: bool,
    },
    AddGraphAction {
        #[serde(default)]
        name: Option<String>,
        transform: TransformSpec,
    },
    DeleteGraphActions {
        #[serde(default)]
        indices: Option<Vec<usize>>,
        #[serde(default)]
        names: Option<Vec<String>>,
    },
    ReorderGraphActions {
        order: Vec<usize>,
    },
    TriggerGraphActions,
}

impl Step {
    /// Apply this step to `graph`.
    pub fn apply(&self, graph: &Graph) -> Result<Graph, GraphError> {
        match self {
            Self::SetGraphDirected { directed } => graph.set_graph_directed(*directed),
            Self::SetGraphName { name } => graph.set_graph_name(name),
            Self::AddNode {
                node_type,
                label,
                attrs: a,
            } => graph.add_node(NodeSpec {
                node_type: node_type.clone(),
                label: label.clone(),
                attrs: attrs(a),
            }),
            Self::AddNNodes { n, node_type } => graph.add_n_nodes(*n, node_type.as_deref()),
            Self::AddNodeClone { node, label } => {
                graph.add_node_clone(node.clone(), label.as_deref())
            }
            Self::DeleteNode { node, cascade } => {
                if *cascade {
                    graph.delete_node_cascade(node.clone())
                } else {
                    graph.delete_node(node.clone())
                }
            }
            Self::DeleteNodesWs => graph.delete_nodes_ws(),
            Self::AddEdge {
                from,
                to,
                rel,
                attrs: a,
            } => graph.add_edge(EdgeSpec {
                from: from.clone().into_single("from")?,
                to: to.clone().into_single("to")?,
                rel: rel.clone(),
                attrs: attrs(a),
            }),
            Self::AddEdges { from, to, rel } => graph.add_edges(from, to, rel.as_deref()),
            Self::AddEdgesWString { edges, rel } => graph.add_edges_w_string(edges, rel.as_deref()),
            Self::AddEdgeClone { edge, from, to } => {
                graph.add_edge_clone(EdgeId(*edge), from.clone(), to.clone())
            }
            Self::DeleteEdge { edge } => graph.delete_edge(EdgeId(*edge)),
            Self::DeleteEdgesWs => graph.delete_edges_ws(),
            Self::SetNodeAttrs {
                nodes,
                column,
                values,
            } => graph.set_node_attrs(&node_ids(nodes), column, &values_of(values)),
            Self::SetEdgeAttrs {
                edges,
                column,
                values,
            } => graph.set_edge_attrs(&edge_ids(edges), column, &values_of(values)),
            Self::SetNodeAttrsWs { column, value } => {
                graph.set_node_attrs_ws(column, value.clone().into())
            }
            Self::SetEdgeAttrsWs { column, value } => {
                graph.set_edge_attrs_ws(column, value.clone().into())
            }
            Self::MutateNodeAttrs { assignments } => {
                graph.mutate_node_attrs(&parse_assignments(assignments)?)
            }
            Self::MutateEdgeAttrs { assignments } => {
                graph.mutate_edge_attrs(&parse_assignments(assignments)?)
            }
            Self::MutateNodeAttrsWs { assignments } => {
                graph.mutate_node_attrs_ws(&parse_assignments(assignments)?)
            }
            Self::MutateEdgeAttrsWs { assignments } => {
                graph.mutate_edge_attrs_ws(&parse_assignments(assignments)?)
            }
            Self::DropNodeAttrs { columns } => graph.drop_node_attrs(columns),
            Self::DropEdgeAttrs { columns } => graph.drop_edge_attrs(columns),
            Self::RenameNodeAttrs { from, to } => graph.rename_node_attrs(from, to),
            Self::RenameEdgeAttrs { from, to } => graph.rename_edge_attrs(from, to),
            Self::CopyNodeAttrs { from, to } => graph.copy_node_attrs(from, to),
            Self::CopyEdgeAttrs { from, to } => graph.copy_edge_attrs(from, to),
            Self::SelectNodes {
                conditions,
                set_op,
                nodes,
            } => {
                let predicate = parse_conditions(conditions.as_deref())?;
                let ids = nodes.as_deref().map(node_ids);
                graph.select_nodes(predicate.as_ref(), *set_op, ids.as_deref())
            }
            Self::SelectEdges {
                conditions,
                set_op,
                edges,
            } => {
                let predicate = parse_conditions(conditions.as_deref())?;
                let ids = edges.as_deref().map(edge_ids);
                graph.select_edges(predicate.as_ref(), *set_op, ids.as_deref())
            }
            Self::SelectNodesById { nodes, set_op } => {
                graph.select_nodes_by_id(&node_ids(nodes), *set_op)
            }
            Self::SelectEdgesByEdgeId { edges, set_op } => {
                graph.select_edges_by_edge_id(&edge_ids(edges), *set_op)
            }
            Self::SelectEdgesByNodeId { nodes, set_op } => {
                graph.select_edges_by_node_id(&node_ids(nodes), *set_op)
            }
            Self::SelectNodesByDegree {
                expressions,
                set_op,
            } => graph.select_nodes_by_degree(&Expr::parse(expressions)?, *set_op),
            Self::SelectLastNodesCreated => graph.select_last_nodes_created(),
            Self::SelectLastEdgesCreated => graph.select_last_edges_created(),
            Self::InvertSelection => graph.invert_selection(),
            Self::ClearSelection => graph.clear_selection(),
            Self::TravOut(spec) => graph.trav_out(&spec.to_options()?),
            Self::TravIn(spec) => graph.trav_in(&spec.to_options()?),
            Self::TravBoth(spec) => graph.trav_both(&spec.to_options()?),
            Self::TravOutEdge(spec) => graph.trav_out_edge(&spec.to_options()?),
            Self::TravInEdge(spec) => graph.trav_in_edge(&spec.to_options()?),
            Self::TravBothEdge(spec) => graph.trav_both_edge(&spec.to_options()?),
            Self::TravOutNode(spec) => graph.trav_out_node(&spec.to_options()?),
            Self::TravInNode(spec) => graph.trav_in_node(&spec.to_options()?),
            Self::TravReverseEdge {
                conditions,
                add_to_selection,
            } => graph.trav_reverse_edge(
                parse_conditions(conditions.as_deref())?.as_ref(),
                *add_to_selection,
            ),
            Self::AddGraphAction { name, transform } => {
                graph.add_graph_action(transform.to_transform()?, name.as_deref())
            }
            Self::DeleteGraphActions { indices, names } => {
                let selector = match (indices, names) {
                    (Some(indices), None) => ActionSelector::Indices(indices.clone()),
                    (None, Some(names)) => ActionSelector::Names(names.clone()),
                    _ => {
                        return Err(GraphError::Argument(
                            "delete_graph_actions takes exactly one of `indices` or `names`"
                                .to_string(),
                        ));
                    }
                };
                graph.delete_graph_actions(&selector)
            }
            Self::ReorderGraphActions { order } => graph.reorder_graph_actions(order),
            Self::TriggerGraphActions => graph.trigger_graph_actions(),
        }
    }
}

fn values_of(values: &[Scalar]) -> Vec<Value> {
    values.iter().cloned().map(Value::from).collect()
}

// =============================================================================
// PIPELINE
// =============================================================================

/// The `[graph]` header of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineGraph {
    pub directed: bool,
    pub name: Option<String>,
}

impl Default for PipelineGraph {
    fn default() -> Self {
        let options = GraphOptions::default();
        Self {
            directed: options.directed,
            name: options.name,
        }
    }
}

/// A graph header plus the steps to run on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub graph: PipelineGraph,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// The empty graph the steps start from.
    #[must_use]
    pub fn start(&self) -> Graph {
        Graph::with_options(GraphOptions {
            directed: self.graph.directed,
            name: self.graph.name.clone(),
        })
    }

    /// Run every step on a fresh graph.
    pub fn run(&self) -> Result<Graph, GraphError> {
        self.run_on(self.start())
    }

    /// Run every step, in order, starting from `graph`.
    pub fn run_on(&self, graph: Graph) -> Result<Graph, GraphError> {
        let mut graph = graph;
        for (index, step) in self.steps.iter().enumerate() {
            graph = step.apply(&graph).inspect_err(|e| {
                tracing::warn!(step = index + 1, error = %e, "pipeline step failed");
            })?;
        }
        Ok(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(conditions: &str) -> TravSpec {
        TravSpec {
            conditions: Some(conditions.to_string()),
            ..TravSpec::default()
        }
    }

    #[test]
    fn steps_run_in_order() {
        let pipeline = Pipeline {
            graph: PipelineGraph::default(),
            steps: vec![
                Step::AddNNodes {
                    n: 3,
                    node_type: Some("city".to_string()),
                },
                Step::AddEdgesWString {
                    edges: "1->2 2->3".to_string(),
                    rel: None,
                },
                Step::SelectNodesById {
                    nodes: vec![1],
                    set_op: SetOp::Union,
                },
                Step::TravOut(spec("type == \"city\"")),
            ],
        };
        let g = pipeline.run().expect("run");
        assert_eq!(g.get_selected_node_ids(), vec![NodeId(2)]);
        assert_eq!(g.get_graph_log().len(), 5);
    }

    #[test]
    fn add_edge_rejects_multiple_endpoints() {
        let step = Step::AddEdge {
            from: OneOrMany::Many(vec![NodeRef::from(1u64), NodeRef::from(2u64)]),
            to: OneOrMany::One(NodeRef::from(3u64)),
            rel: None,
            attrs: BTreeMap::new(),
        };
        let g = Graph::new().add_n_nodes(3, None).expect("nodes");
        let err = step.apply(&g).expect_err("two from nodes");
        assert!(matches!(err, GraphError::Argument(_)));

        let single = Step::AddEdge {
            from: OneOrMany::Many(vec![NodeRef::from(1u64)]),
            to: OneOrMany::One(NodeRef::from("3")),
            rel: Some("r".to_string()),
            attrs: BTreeMap::new(),
        };
        assert!(single.apply(&g).is_err(), "label `3` does not exist");
    }

    #[test]
    fn unknown_aggregator_is_reported() {
        let spec = TravSpec {
            copy_attrs_from: Some("w".to_string()),
            agg: Some("avg".to_string()),
            ..TravSpec::default()
        };
        assert!(matches!(
            spec.to_options(),
            Err(GraphError::UnknownAggregator(_))
        ));
    }

    #[test]
    fn failing_step_stops_the_run() {
        let pipeline = Pipeline {
            graph: PipelineGraph::default(),
            steps: vec![
                Step::AddNNodes {
                    n: 1,
                    node_type: None,
                },
                Step::DeleteEdge { edge: 9 },
            ],
        };
        assert!(matches!(pipeline.run(), Err(GraphError::Reference(_))));
    }

    #[test]
    fn graph_actions_from_specs() {
        let pipeline = Pipeline {
            graph: PipelineGraph {
                directed: false,
                name: Some("g".to_string()),
            },
            steps: vec![
                Step::AddGraphAction {
                    name: Some("deg".to_string()),
                    transform: TransformSpec::Degree {
                        column: "deg".to_string(),
                        mode: DegreeMode::Total,
                        directed: None,
                    },
                },
                Step::AddNNodes {
                    n: 2,
                    node_type: None,
                },
                Step::AddEdgesWString {
                    edges: "1--2".to_string(),
                    rel: None,
                },
            ],
        };
        let g = pipeline.run().expect("run");
        assert_eq!(g.nodes().value(NodeId(1), "deg"), Some(Value::Int(1)));
        assert!(!g.is_directed());
    }
}
