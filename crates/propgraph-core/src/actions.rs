//! # Graph Actions
//!
//! Named follow-up transformations registered on a graph and replayed, in
//! index order, after every operation that changes the edge count.
//!
//! A [`Transform`] is plain serializable data naming one graph operation
//! and its parameters, so registered actions survive persistence.

use crate::algo::DegreeMode;
use crate::expr::Expr;
use crate::graph::Graph;
use crate::{GraphError, NodeId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TRANSFORMS
// =============================================================================

/// `target = expr`, evaluated per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: String,
    pub expr: Expr,
}

impl Assignment {
    #[must_use]
    pub fn new(target: impl Into<String>, expr: Expr) -> Self {
        Self {
            target: target.into(),
            expr,
        }
    }

    /// Parse `expr_src` and pair it with `target`.
    pub fn parse(target: impl Into<String>, expr_src: &str) -> Result<Self, GraphError> {
        Ok(Self::new(target, Expr::parse(expr_src)?))
    }
}

/// Per-node scalar computed through the algorithm engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeMetric {
    Degree(DegreeMode),
    /// Weakly-connected component membership, numbered from 1.
    WeakComponent,
}

/// A replayable graph transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    MutateNodeAttrs(Vec<Assignment>),
    MutateEdgeAttrs(Vec<Assignment>),
    /// Set a column to one value on every node.
    SetNodeAttr { column: String, value: Value },
    /// Set a column to one value on every edge.
    SetEdgeAttr { column: String, value: Value },
    SetNodeMetric {
        column: String,
        metric: NodeMetric,
        /// Override the graph's directedness for the computation.
        directed: Option<bool>,
    },
    CopyNodeAttrs { from: String, to: String },
    DropNodeAttrs(Vec<String>),
    ClearSelection,
}

impl Transform {
    /// Operation name, as it would appear in the log.
    #[must_use]
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::MutateNodeAttrs(_) => "mutate_node_attrs",
            Self::MutateEdgeAttrs(_) => "mutate_edge_attrs",
            Self::SetNodeAttr { .. } => "set_node_attrs",
            Self::SetEdgeAttr { .. } => "set_edge_attrs",
            Self::SetNodeMetric { .. } => "join_node_attrs",
            Self::CopyNodeAttrs { .. } => "copy_node_attrs",
            Self::DropNodeAttrs(_) => "drop_node_attrs",
            Self::ClearSelection => "clear_selection",
        }
    }

    /// Reject expressions whose calls have the wrong number of arguments.
    pub fn validate(&self) -> Result<(), GraphError> {
        match self {
            Self::MutateNodeAttrs(assignments) | Self::MutateEdgeAttrs(assignments) => assignments
                .iter()
                .try_for_each(|a| a.expr.validate()),
            _ => Ok(()),
        }
    }

    /// Apply the transformation to `graph`.
    pub fn apply(&self, graph: &Graph) -> Result<Graph, GraphError> {
        match self {
            Self::MutateNodeAttrs(assignments) => graph.mutate_node_attrs(assignments),
            Self::MutateEdgeAttrs(assignments) => graph.mutate_edge_attrs(assignments),
            Self::SetNodeAttr { column, value } => {
                let ids: Vec<NodeId> = graph.nodes().ids().collect();
                graph.set_node_attrs(&ids, column, std::slice::from_ref(value))
            }
            Self::SetEdgeAttr { column, value } => {
                let ids: Vec<_> = graph.edges().ids().collect();
                graph.set_edge_attrs(&ids, column, std::slice::from_ref(value))
            }
            Self::SetNodeMetric {
                column,
                metric,
                directed,
            } => {
                let algo = graph.to_algorithm_graph(*directed);
                let values: BTreeMap<NodeId, Value> = match metric {
                    NodeMetric::Degree(mode) => algo.degree(*mode),
                    NodeMetric::WeakComponent => algo.weak_components(),
                };
                graph.join_node_attrs(column, &values)
            }
            Self::CopyNodeAttrs { from, to } => graph.copy_node_attrs(from, to),
            Self::DropNodeAttrs(columns) => graph.drop_node_attrs(columns),
            Self::ClearSelection => graph.clear_selection(),
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// One registered action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAction {
    /// Position in the replay order, 1-based and contiguous.
    pub index: usize,
    pub name: Option<String>,
    pub transform: Transform,
}

/// Which actions to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSelector {
    Indices(Vec<usize>),
    Names(Vec<String>),
}

/// Ordered list of [`GraphAction`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRegistry {
    actions: Vec<GraphAction>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_actions(actions: Vec<GraphAction>) -> Self {
        Self { actions }
    }

    #[must_use]
    pub fn actions(&self) -> &[GraphAction] {
        &self.actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Append an action at the end; returns its index.
    pub(crate) fn add(&mut self, transform: Transform, name: Option<String>) -> Result<usize, GraphError> {
        transform.validate()?;
        if let Some(name) = &name {
            if self.actions.iter().any(|a| a.name.as_ref() == Some(name)) {
                return Err(GraphError::Argument(format!(
                    "an action named `{}` already exists",
                    name
                )));
            }
        }
        let index = self.actions.len() + 1;
        self.actions.push(GraphAction {
            index,
            name,
            transform,
        });
        Ok(index)
    }

    /// Remove the selected actions and re-index the survivors.
    pub(crate) fn delete(&mut self, selector: &ActionSelector) -> Result<(), GraphError> {
        if self.actions.is_empty() {
            return Err(GraphError::Precondition(
                "the graph has no registered actions".to_string(),
            ));
        }
        let doomed: Vec<usize> = match selector {
            ActionSelector::Indices(indices) => {
                if indices.is_empty() {
                    return Err(GraphError::Argument("no action indices given".to_string()));
                }
                for i in indices {
                    if *i == 0 || *i > self.actions.len() {
                        return Err(GraphError::Reference(format!(
                            "no action at index {}",
                            i
                        )));
                    }
                }
                indices.clone()
            }
            ActionSelector::Names(names) => {
                if names.is_empty() {
                    return Err(GraphError::Argument("no action names given".to_string()));
                }
                names
                    .iter()
                    .map(|n| {
                        self.actions
                            .iter()
                            .find(|a| a.name.as_ref() == Some(n))
                            .map(|a| a.index)
                            .ok_or_else(|| {
                                GraphError::Reference(format!("no action named `{}`", n))
                            })
                    })
                    .collect::<Result<_, _>>()?
            }
        };
        self.actions.retain(|a| !doomed.contains(&a.index));
        self.reindex();
        Ok(())
    }

    /// Reorder so that the action at old index `order[i]` becomes index `i + 1`.
    pub(crate) fn reorder(&mut self, order: &[usize]) -> Result<(), GraphError> {
        if self.actions.is_empty() {
            return Err(GraphError::Precondition(
                "the graph has no registered actions".to_string(),
            ));
        }
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        if sorted != (1..=self.actions.len()).collect::<Vec<_>>() {
            return Err(GraphError::Argument(format!(
                "order must be a permutation of 1..={}",
                self.actions.len()
            )));
        }
        let mut reordered = Vec::with_capacity(order.len());
        for old in order {
            if let Some(action) = self.actions.get(old - 1) {
                reordered.push(action.clone());
            }
        }
        self.actions = reordered;
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        for (i, action) in self.actions.iter_mut().enumerate() {
            action.index = i + 1;
        }
    }

    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        let mut names = std::collections::BTreeSet::new();
        for (i, action) in self.actions.iter().enumerate() {
            if action.index != i + 1 {
                return Err(GraphError::Validation(format!(
                    "action at position {} has index {}",
                    i + 1,
                    action.index
                )));
            }
            action.transform.validate().map_err(|e| {
                GraphError::Validation(format!("action {}: {}", action.index, e))
            })?;
            if let Some(name) = &action.name {
                if !names.insert(name) {
                    return Err(GraphError::Validation(format!(
                        "duplicate action name `{}`",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}
