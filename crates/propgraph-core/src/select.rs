//! # Selection Operations
//!
//! Operations that set, combine, invert or clear the active selection.
//! Selecting nodes always clears an edge selection and vice versa.

use crate::algo::DegreeMode;
use crate::expr::{Expr, RowAccess};
use crate::graph::{Graph, Trigger};
use crate::selection::{EdgeSelection, Selection, SetOp};
use crate::table::{EdgeRecord, Record, Table};
use crate::{EdgeId, GraphError, NodeId, Value};
use std::collections::{BTreeMap, BTreeSet};

impl From<&EdgeRecord> for EdgeSelection {
    fn from(edge: &EdgeRecord) -> Self {
        Self {
            edge: edge.id,
            from: edge.from,
            to: edge.to,
        }
    }
}

/// Rows of `table` matching `predicate` (all rows when `None`).
fn filter_rows<R: Record>(
    table: &Table<R>,
    predicate: Option<&Expr>,
) -> Result<BTreeSet<R::Id>, GraphError> {
    let mut out = BTreeSet::new();
    for (id, row) in table.rows() {
        if predicate.map_or(Ok(true), |p| p.matches(&row))? {
            out.insert(id);
        }
    }
    Ok(out)
}

fn require_existing<R: Record>(table: &Table<R>, ids: &[R::Id]) -> Result<BTreeSet<R::Id>, GraphError> {
    if ids.is_empty() {
        return Err(GraphError::Argument(format!("no {} ids given", R::KIND)));
    }
    if let Some(missing) = ids.iter().find(|id| !table.contains(**id)) {
        return Err(GraphError::Reference(format!(
            "{} id {} does not exist",
            R::KIND,
            missing
        )));
    }
    Ok(ids.iter().copied().collect())
}

/// A node row extended with computed `deg`, `indeg` and `outdeg` columns.
struct DegreeRow<'a, T: RowAccess> {
    row: T,
    degrees: [(&'static str, &'a BTreeMap<NodeId, Value>); 3],
    id: NodeId,
}

impl<T: RowAccess> RowAccess for DegreeRow<'_, T> {
    fn column(&self, name: &str) -> Option<Value> {
        self.degrees
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, values)| values.get(&self.id).cloned().unwrap_or_default())
            .or_else(|| self.row.column(name))
    }
}

impl Graph {
    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn get_selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn get_selected_node_ids(&self) -> Vec<NodeId> {
        self.selection.node_ids().into_iter().collect()
    }

    #[must_use]
    pub fn get_selected_edge_ids(&self) -> Vec<EdgeId> {
        self.selection.edge_ids().into_iter().collect()
    }

    fn edge_selection_of(&self, ids: &BTreeSet<EdgeId>) -> BTreeSet<EdgeSelection> {
        ids.iter()
            .filter_map(|id| self.edges.get(*id))
            .map(EdgeSelection::from)
            .collect()
    }

    fn commit_node_selection(
        &self,
        function_name: &str,
        set_op: SetOp,
        candidates: &BTreeSet<NodeId>,
    ) -> Result<Graph, GraphError> {
        let combined = set_op.apply(&self.selection.node_ids(), candidates);
        self.transact(function_name, Trigger::Never, |g| {
            g.selection = Selection::nodes(combined);
            Ok(())
        })
    }

    fn commit_edge_selection(
        &self,
        function_name: &str,
        set_op: SetOp,
        candidates: &BTreeSet<EdgeId>,
    ) -> Result<Graph, GraphError> {
        let combined = set_op.apply(&self.selection.edge_ids(), candidates);
        let edges = self.edge_selection_of(&combined);
        self.transact(function_name, Trigger::Never, |g| {
            g.selection = Selection::edges(edges);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Predicate selection
    // -------------------------------------------------------------------------

    /// Select nodes matching `predicate`, restricted to `ids` when given,
    /// and combine them with the current node selection.
    pub fn select_nodes(
        &self,
        predicate: Option<&Expr>,
        set_op: SetOp,
        ids: Option<&[NodeId]>,
    ) -> Result<Graph, GraphError> {
        let mut candidates = filter_rows(&self.nodes, predicate)?;
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            let explicit: BTreeSet<NodeId> = ids.iter().copied().collect();
            if !explicit.iter().any(|id| self.nodes.contains(*id)) {
                return Err(GraphError::Reference(
                    "none of the given node ids exist in the graph".to_string(),
                ));
            }
            candidates = candidates.intersection(&explicit).copied().collect();
        }
        self.commit_node_selection("select_nodes", set_op, &candidates)
    }

    /// Select edges matching `predicate`, restricted to `ids` when given,
    /// and combine them with the current edge selection.
    pub fn select_edges(
        &self,
        predicate: Option<&Expr>,
        set_op: SetOp,
        ids: Option<&[EdgeId]>,
    ) -> Result<Graph, GraphError> {
        let mut candidates = filter_rows(&self.edges, predicate)?;
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            let explicit: BTreeSet<EdgeId> = ids.iter().copied().collect();
            if !explicit.iter().any(|id| self.edges.contains(*id)) {
                return Err(GraphError::Reference(
                    "none of the given edge ids exist in the graph".to_string(),
                ));
            }
            candidates = candidates.intersection(&explicit).copied().collect();
        }
        self.commit_edge_selection("select_edges", set_op, &candidates)
    }

    // -------------------------------------------------------------------------
    // Id selection
    // -------------------------------------------------------------------------

    pub fn select_nodes_by_id(&self, ids: &[NodeId], set_op: SetOp) -> Result<Graph, GraphError> {
        let candidates = require_existing(&self.nodes, ids)?;
        self.commit_node_selection("select_nodes_by_id", set_op, &candidates)
    }

    pub fn select_edges_by_edge_id(&self, ids: &[EdgeId], set_op: SetOp) -> Result<Graph, GraphError> {
        let candidates = require_existing(&self.edges, ids)?;
        self.commit_edge_selection("select_edges_by_edge_id", set_op, &candidates)
    }

    /// Select every edge with at least one endpoint among `nodes`.
    pub fn select_edges_by_node_id(&self, nodes: &[NodeId], set_op: SetOp) -> Result<Graph, GraphError> {
        let nodes = require_existing(&self.nodes, nodes)?;
        let candidates: BTreeSet<EdgeId> = self
            .edges
            .iter()
            .filter(|e| nodes.contains(&e.from) || nodes.contains(&e.to))
            .map(|e| e.id)
            .collect();
        self.commit_edge_selection("select_edges_by_node_id", set_op, &candidates)
    }

    /// Select nodes by a predicate that may use `deg`, `indeg` and `outdeg`.
    pub fn select_nodes_by_degree(&self, predicate: &Expr, set_op: SetOp) -> Result<Graph, GraphError> {
        let algo = self.to_algorithm_graph(None);
        let (total, incoming, outgoing) = (
            algo.degree(DegreeMode::Total),
            algo.degree(DegreeMode::In),
            algo.degree(DegreeMode::Out),
        );
        let mut candidates = BTreeSet::new();
        for (id, row) in self.nodes.rows() {
            let row = DegreeRow {
                row,
                degrees: [("deg", &total), ("indeg", &incoming), ("outdeg", &outgoing)],
                id,
            };
            if predicate.matches(&row)? {
                candidates.insert(id);
            }
        }
        self.commit_node_selection("select_nodes_by_degree", set_op, &candidates)
    }

    // -------------------------------------------------------------------------
    // Last-created selection
    // -------------------------------------------------------------------------

    /// Select the nodes created by the most recent node-adding operation.
    pub fn select_last_nodes_created(&self) -> Result<Graph, GraphError> {
        let created = self
            .log
            .entries()
            .iter()
            .rev()
            .find_map(|e| e.node_delta.filter(|d| *d > 0))
            .ok_or_else(|| GraphError::Precondition("no nodes have been created".to_string()))?;
        let last = self.nodes.last_id();
        let first = last.saturating_sub(created as u64) + 1;
        let ids: BTreeSet<NodeId> = (first..=last)
            .map(NodeId)
            .filter(|id| self.nodes.contains(*id))
            .collect();
        if ids.is_empty() {
            return Err(GraphError::Precondition(
                "the last created nodes no longer exist".to_string(),
            ));
        }
        self.transact("select_last_nodes_created", Trigger::Never, |g| {
            g.selection = Selection::nodes(ids);
            Ok(())
        })
    }

    /// Select the edges created by the most recent edge-adding operation.
    pub fn select_last_edges_created(&self) -> Result<Graph, GraphError> {
        let created = self
            .log
            .entries()
            .iter()
            .rev()
            .find_map(|e| e.edge_delta.filter(|d| *d > 0))
            .ok_or_else(|| GraphError::Precondition("no edges have been created".to_string()))?;
        let last = self.edges.last_id();
        let first = last.saturating_sub(created as u64) + 1;
        let ids: BTreeSet<EdgeId> = (first..=last).map(EdgeId).collect();
        let edges = self.edge_selection_of(&ids);
        if edges.is_empty() {
            return Err(GraphError::Precondition(
                "the last created edges no longer exist".to_string(),
            ));
        }
        self.transact("select_last_edges_created", Trigger::Never, |g| {
            g.selection = Selection::edges(edges);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Invert / clear
    // -------------------------------------------------------------------------

    /// Replace the selection with its complement within the same kind.
    pub fn invert_selection(&self) -> Result<Graph, GraphError> {
        let inverted = match &self.selection {
            Selection::None => {
                return Err(GraphError::Precondition(
                    "there is no selection to invert".to_string(),
                ));
            }
            Selection::Nodes(ids) => {
                Selection::nodes(self.nodes.ids().filter(|id| !ids.contains(id)).collect())
            }
            Selection::Edges(_) => {
                let selected = self.selection.edge_ids();
                Selection::edges(
                    self.edges
                        .iter()
                        .filter(|e| !selected.contains(&e.id))
                        .map(EdgeSelection::from)
                        .collect(),
                )
            }
        };
        self.transact("invert_selection", Trigger::Never, |g| {
            g.selection = inverted;
            Ok(())
        })
    }

    pub fn clear_selection(&self) -> Result<Graph, GraphError> {
        self.transact("clear_selection", Trigger::Never, |g| {
            g.selection = Selection::None;
            Ok(())
        })
    }
}
