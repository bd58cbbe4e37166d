//! # Attribute Operations
//!
//! Column-level edits on the node and edge tables: set, mutate, drop,
//! rename, copy and join. Node and edge variants share one generic
//! implementation over [`Table`].

use crate::actions::Assignment;
use crate::graph::{Graph, Trigger};
use crate::primitives::IMMUTABLE_COLUMNS;
use crate::selection::Selection;
use crate::table::{Record, Table};
use crate::{EdgeId, GraphError, NodeId, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TABLE HELPERS
// =============================================================================

fn set_rows<R: Record>(
    table: &mut Table<R>,
    ids: &[R::Id],
    column: &str,
    values: &[Value],
) -> Result<(), GraphError> {
    if values.len() != 1 && values.len() != ids.len() {
        return Err(GraphError::Argument(format!(
            "expected 1 or {} values for `{}`, got {}",
            ids.len(),
            column,
            values.len()
        )));
    }
    if IMMUTABLE_COLUMNS.contains(&column) {
        return Err(GraphError::ProtectedColumn(column.to_string()));
    }
    if let Some(missing) = ids.iter().find(|id| !table.contains(**id)) {
        return Err(GraphError::Reference(format!(
            "{} id {} does not exist",
            R::KIND,
            missing
        )));
    }
    table.ensure_column(column)?;
    for (i, id) in ids.iter().enumerate() {
        let value = if values.len() == 1 { &values[0] } else { &values[i] };
        table.set(*id, column, value.clone())?;
    }
    Ok(())
}

/// Evaluate each assignment in order over `rows` (all rows when `None`).
/// Later assignments see the columns written by earlier ones.
fn mutate_rows<R: Record>(
    table: &mut Table<R>,
    rows: Option<&BTreeSet<R::Id>>,
    assignments: &[Assignment],
) -> Result<(), GraphError> {
    if assignments.is_empty() {
        return Err(GraphError::Argument("no expressions given".to_string()));
    }
    for Assignment { target, expr } in assignments {
        if IMMUTABLE_COLUMNS.contains(&target.as_str()) {
            return Err(GraphError::ProtectedColumn(target.clone()));
        }
        let results = table
            .rows()
            .filter(|(id, _)| rows.is_none_or(|r| r.contains(id)))
            .map(|(id, row)| expr.eval(&row).map(|v| (id, v)))
            .collect::<Result<Vec<_>, _>>()?;
        table.ensure_column(target)?;
        for (id, value) in results {
            table.set(id, target, value)?;
        }
    }
    Ok(())
}

fn drop_columns<R: Record, S: AsRef<str>>(table: &mut Table<R>, columns: &[S]) -> Result<(), GraphError> {
    if columns.is_empty() {
        return Err(GraphError::Argument("no columns given".to_string()));
    }
    for column in columns {
        table.drop_column(column.as_ref())?;
    }
    Ok(())
}

fn selected_nodes(graph: &Graph, op: &str) -> Result<BTreeSet<NodeId>, GraphError> {
    match &graph.selection {
        Selection::Nodes(ids) => Ok(ids.clone()),
        _ => Err(GraphError::Precondition(format!(
            "{} requires a node selection",
            op
        ))),
    }
}

fn selected_edges(graph: &Graph, op: &str) -> Result<BTreeSet<EdgeId>, GraphError> {
    match &graph.selection {
        Selection::Edges(_) => Ok(graph.selection.edge_ids()),
        _ => Err(GraphError::Precondition(format!(
            "{} requires an edge selection",
            op
        ))),
    }
}

// =============================================================================
// GRAPH OPERATIONS
// =============================================================================

impl Graph {
    /// Set `column` on the given nodes; `values` has length 1 or `ids.len()`.
    pub fn set_node_attrs(
        &self,
        ids: &[NodeId],
        column: &str,
        values: &[Value],
    ) -> Result<Graph, GraphError> {
        self.transact("set_node_attrs", Trigger::Never, |g| {
            set_rows(&mut g.nodes, ids, column, values)
        })
    }

    /// Set `column` on the given edges; `values` has length 1 or `ids.len()`.
    pub fn set_edge_attrs(
        &self,
        ids: &[EdgeId],
        column: &str,
        values: &[Value],
    ) -> Result<Graph, GraphError> {
        self.transact("set_edge_attrs", Trigger::Never, |g| {
            set_rows(&mut g.edges, ids, column, values)
        })
    }

    /// Set `column` to `value` on every selected node.
    pub fn set_node_attrs_ws(&self, column: &str, value: Value) -> Result<Graph, GraphError> {
        let ids: Vec<NodeId> = selected_nodes(self, "set_node_attrs_ws")?.into_iter().collect();
        self.transact("set_node_attrs_ws", Trigger::Never, |g| {
            set_rows(&mut g.nodes, &ids, column, std::slice::from_ref(&value))
        })
    }

    /// Set `column` to `value` on every selected edge.
    pub fn set_edge_attrs_ws(&self, column: &str, value: Value) -> Result<Graph, GraphError> {
        let ids: Vec<EdgeId> = selected_edges(self, "set_edge_attrs_ws")?.into_iter().collect();
        self.transact("set_edge_attrs_ws", Trigger::Never, |g| {
            set_rows(&mut g.edges, &ids, column, std::slice::from_ref(&value))
        })
    }

    /// Evaluate assignments over all nodes, in order.
    pub fn mutate_node_attrs(&self, assignments: &[Assignment]) -> Result<Graph, GraphError> {
        self.transact("mutate_node_attrs", Trigger::Never, |g| {
            mutate_rows(&mut g.nodes, None, assignments)
        })
    }

    /// Evaluate assignments over all edges, in order.
    pub fn mutate_edge_attrs(&self, assignments: &[Assignment]) -> Result<Graph, GraphError> {
        self.transact("mutate_edge_attrs", Trigger::Never, |g| {
            mutate_rows(&mut g.edges, None, assignments)
        })
    }

    /// Evaluate assignments over the selected nodes only.
    pub fn mutate_node_attrs_ws(&self, assignments: &[Assignment]) -> Result<Graph, GraphError> {
        let ids = selected_nodes(self, "mutate_node_attrs_ws")?;
        self.transact("mutate_node_attrs_ws", Trigger::Never, |g| {
            mutate_rows(&mut g.nodes, Some(&ids), assignments)
        })
    }

    /// Evaluate assignments over the selected edges only.
    pub fn mutate_edge_attrs_ws(&self, assignments: &[Assignment]) -> Result<Graph, GraphError> {
        let ids = selected_edges(self, "mutate_edge_attrs_ws")?;
        self.transact("mutate_edge_attrs_ws", Trigger::Never, |g| {
            mutate_rows(&mut g.edges, Some(&ids), assignments)
        })
    }

    pub fn drop_node_attrs<S: AsRef<str>>(&self, columns: &[S]) -> Result<Graph, GraphError> {
        self.transact("drop_node_attrs", Trigger::Never, |g| {
            drop_columns(&mut g.nodes, columns)
        })
    }

    pub fn drop_edge_attrs<S: AsRef<str>>(&self, columns: &[S]) -> Result<Graph, GraphError> {
        self.transact("drop_edge_attrs", Trigger::Never, |g| {
            drop_columns(&mut g.edges, columns)
        })
    }

    pub fn rename_node_attrs(&self, from: &str, to: &str) -> Result<Graph, GraphError> {
        self.transact("rename_node_attrs", Trigger::Never, |g| {
            g.nodes.rename_column(from, to)
        })
    }

    pub fn rename_edge_attrs(&self, from: &str, to: &str) -> Result<Graph, GraphError> {
        self.transact("rename_edge_attrs", Trigger::Never, |g| {
            g.edges.rename_column(from, to)
        })
    }

    /// Copy node column `from` into `to`, overwriting `to`.
    pub fn copy_node_attrs(&self, from: &str, to: &str) -> Result<Graph, GraphError> {
        self.transact("copy_node_attrs", Trigger::Never, |g| {
            g.nodes.copy_column(from, to)
        })
    }

    /// Copy edge column `from` into `to`, overwriting `to`.
    pub fn copy_edge_attrs(&self, from: &str, to: &str) -> Result<Graph, GraphError> {
        self.transact("copy_edge_attrs", Trigger::Never, |g| {
            g.edges.copy_column(from, to)
        })
    }

    /// Left-join per-node values into `column`; nodes without a value get `Missing`.
    pub fn join_node_attrs(
        &self,
        column: &str,
        values: &BTreeMap<NodeId, Value>,
    ) -> Result<Graph, GraphError> {
        self.transact("join_node_attrs", Trigger::Never, |g| {
            g.nodes.join_column(column, values)
        })
    }

    /// Left-join per-edge values into `column`; edges without a value get `Missing`.
    pub fn join_edge_attrs(
        &self,
        column: &str,
        values: &BTreeMap<EdgeId, Value>,
    ) -> Result<Graph, GraphError> {
        self.transact("join_edge_attrs", Trigger::Never, |g| {
            g.edges.join_column(column, values)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
