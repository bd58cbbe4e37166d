//! # Graph State
//!
//! The [`Graph`] value: node and edge tables, the active selection, the
//! action log, the registered actions and the graph options.
//!
//! Every public operation takes `&Graph` and returns a new `Graph`; the
//! input is never modified, so a failed operation leaves the caller's
//! graph exactly as it was.
//!
//! ## Transactions
//!
//! All mutating operations run through [`Graph::transact`], which:
//! 1. validates the input graph (outermost call only)
//! 2. runs the operation on a copy
//! 3. replays registered actions if the edge count changed (outermost only)
//! 4. truncates any log entries written by nested operations and appends
//!    exactly one entry for this operation
//! 5. notifies the snapshot hook (outermost only)
//!
//! Composite operations are simply operations that call other public
//! operations inside their transaction.

use crate::actions::{ActionRegistry, ActionSelector, GraphAction, Transform};
use crate::log::{ActionLog, LogEntry};
use crate::primitives::{CREATE_GRAPH_FN, MAX_BATCH_NODES};
use crate::selection::Selection;
use crate::storage::SnapshotHook;
use crate::table::{EdgeRecord, EdgeTable, NodeRecord, NodeTable, TableSnapshot};
use crate::{EdgeId, GraphError, NodeId, NodeRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// OPTIONS & SPECS
// =============================================================================

/// Graph-level options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOptions {
    pub directed: bool,
    pub name: Option<String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            directed: true,
            name: None,
        }
    }
}

/// Description of a node to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub node_type: Option<String>,
    pub label: Option<String>,
    /// Attributes in column-creation order.
    pub attrs: Vec<(String, Value)>,
}

impl NodeSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_attr(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.push((column.into(), value.into()));
        self
    }
}

/// Description of a single edge to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: NodeRef,
    pub to: NodeRef,
    pub rel: Option<String>,
    pub attrs: Vec<(String, Value)>,
}

impl EdgeSpec {
    #[must_use]
    pub fn new(from: impl Into<NodeRef>, to: impl Into<NodeRef>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rel: None,
            attrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    #[must_use]
    pub fn with_attr(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.push((column.into(), value.into()));
        self
    }
}

/// Whether an operation may fire the action trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Never,
    OnEdgeChange,
}

// =============================================================================
// GRAPH
// =============================================================================

/// An in-memory property graph.
#[derive(Clone)]
pub struct Graph {
    pub(crate) nodes: NodeTable,
    pub(crate) edges: EdgeTable,
    pub(crate) selection: Selection,
    pub(crate) log: ActionLog,
    pub(crate) actions: ActionRegistry,
    pub(crate) options: GraphOptions,
    hook: Option<Arc<dyn SnapshotHook>>,
    /// Nesting level of the running transaction; 0 outside any operation.
    depth: u32,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("options", &self.options)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("last_node", &self.nodes.last_id())
            .field("last_edge", &self.edges.last_id())
            .field("selection", &self.selection)
            .field("version", &self.log.last_version())
            .field("actions", &self.actions.len())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Graphs compare by content: tables, selection, log, actions and options.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.edges == other.edges
            && self.selection == other.selection
            && self.log == other.log
            && self.actions == other.actions
            && self.options == other.options
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn delta(before: usize, after: usize) -> i64 {
    after as i64 - before as i64
}

impl Graph {
    /// Create an empty directed graph. Writes log entry 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Create an empty graph with the given options. Writes log entry 1.
    #[must_use]
    pub fn with_options(options: GraphOptions) -> Self {
        let started = Instant::now();
        let mut log = ActionLog::new();
        log.append(CREATE_GRAPH_FN, started.elapsed(), 0, 0, 0, 0);
        Self {
            nodes: NodeTable::new(),
            edges: EdgeTable::new(),
            selection: Selection::None,
            log,
            actions: ActionRegistry::new(),
            options,
            hook: None,
            depth: 0,
        }
    }

    /// Reassemble a graph from persisted parts and validate it.
    pub(crate) fn from_parts(
        nodes: NodeTable,
        edges: EdgeTable,
        selection: Selection,
        log: Vec<LogEntry>,
        actions: Vec<GraphAction>,
        options: GraphOptions,
    ) -> Result<Self, GraphError> {
        let graph = Self {
            nodes,
            edges,
            selection,
            log: ActionLog::from_entries(log),
            actions: ActionRegistry::from_actions(actions),
            options,
            hook: None,
            depth: 0,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Attach a hook notified after every committed outermost operation.
    #[must_use]
    pub fn with_snapshot_hook(mut self, hook: Arc<dyn SnapshotHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Detach the snapshot hook.
    #[must_use]
    pub fn without_snapshot_hook(mut self) -> Self {
        self.hook = None;
        self
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Highest node id ever assigned.
    #[must_use]
    pub fn last_node(&self) -> u64 {
        self.nodes.last_id()
    }

    /// Highest edge id ever assigned.
    #[must_use]
    pub fn last_edge(&self) -> u64 {
        self.edges.last_id()
    }

    #[must_use]
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.options.directed
    }

    #[must_use]
    pub fn get_node_table(&self) -> TableSnapshot {
        self.nodes.snapshot()
    }

    #[must_use]
    pub fn get_edge_table(&self) -> TableSnapshot {
        self.edges.snapshot()
    }

    #[must_use]
    pub fn get_graph_log(&self) -> &ActionLog {
        &self.log
    }

    #[must_use]
    pub fn get_graph_actions(&self) -> &[GraphAction] {
        self.actions.actions()
    }

    // -------------------------------------------------------------------------
    // Validation & transactions
    // -------------------------------------------------------------------------

    /// Check the internal consistency of the graph object.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.nodes.validate()?;
        self.edges.validate()?;
        self.actions.validate()?;
        if !self.log.is_contiguous() {
            return Err(GraphError::Validation(
                "log versions are not contiguous".to_string(),
            ));
        }
        if self.log.is_empty() {
            return Err(GraphError::Validation("log is empty".to_string()));
        }
        match &self.selection {
            Selection::Nodes(ids) => {
                if let Some(id) = ids.iter().find(|id| !self.nodes.contains(**id)) {
                    return Err(GraphError::Validation(format!(
                        "selected node {} does not exist",
                        id
                    )));
                }
            }
            Selection::Edges(edges) => {
                if let Some(e) = edges.iter().find(|e| !self.edges.contains(e.edge)) {
                    return Err(GraphError::Validation(format!(
                        "selected edge {} does not exist",
                        e.edge
                    )));
                }
            }
            Selection::None => {}
        }
        Ok(())
    }

    /// Run `op` on a copy of the graph as one logged operation.
    pub(crate) fn transact(
        &self,
        function_name: &str,
        trigger: Trigger,
        op: impl FnOnce(&mut Graph) -> Result<(), GraphError>,
    ) -> Result<Graph, GraphError> {
        let started = Instant::now();
        let outermost = self.depth == 0;
        if outermost {
            self.validate()?;
        }
        let base_version = self.log.last_version();
        let (nodes_before, edges_before) = (self.nodes.len(), self.edges.len());

        let mut work = self.clone();
        work.depth += 1;
        op(&mut work)?;
        if outermost
            && trigger == Trigger::OnEdgeChange
            && work.edges.len() != edges_before
            && !work.actions.is_empty()
        {
            work = work.replay_actions()?;
        }
        work.depth = self.depth;

        work.log.truncate_to(base_version);
        let version = work.log.append(
            function_name,
            started.elapsed(),
            work.nodes.len(),
            work.edges.len(),
            delta(nodes_before, work.nodes.len()),
            delta(edges_before, work.edges.len()),
        );

        if outermost {
            tracing::debug!(
                function = function_name,
                version,
                nodes = work.nodes.len(),
                edges = work.edges.len(),
                "committed graph operation"
            );
            if let Some(hook) = &work.hook {
                if let Err(e) = hook.on_commit(&work) {
                    tracing::warn!(function = function_name, version, error = %e, "snapshot hook failed");
                    return Err(e);
                }
            }
        }
        Ok(work)
    }

    /// Apply every registered action in index order.
    fn replay_actions(self) -> Result<Graph, GraphError> {
        let actions = self.actions.actions().to_vec();
        let mut graph = self;
        for action in &actions {
            tracing::debug!(
                index = action.index,
                name = action.name.as_deref().unwrap_or(""),
                transform = action.transform.function_name(),
                "replaying graph action"
            );
            graph = action.transform.apply(&graph)?;
        }
        Ok(graph)
    }

    // -------------------------------------------------------------------------
    // Graph options
    // -------------------------------------------------------------------------

    pub fn set_graph_directed(&self, directed: bool) -> Result<Graph, GraphError> {
        self.transact("set_graph_directed", Trigger::Never, |g| {
            g.options.directed = directed;
            Ok(())
        })
    }

    pub fn set_graph_name(&self, name: &str) -> Result<Graph, GraphError> {
        self.transact("set_graph_name", Trigger::Never, |g| {
            g.options.name = Some(name.to_string());
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    fn insert_node(&mut self, spec: NodeSpec) -> Result<NodeId, GraphError> {
        let NodeSpec {
            node_type,
            label,
            attrs,
        } = spec;
        let id = self.nodes.insert(|id| NodeRecord {
            id,
            node_type,
            label,
            attrs: BTreeMap::new(),
        });
        for (column, value) in attrs {
            self.nodes.set(id, &column, value)?;
        }
        Ok(id)
    }

    /// Add one node.
    pub fn add_node(&self, spec: NodeSpec) -> Result<Graph, GraphError> {
        self.transact("add_node", Trigger::Never, |g| {
            g.insert_node(spec).map(|_| ())
        })
    }

    /// Add `n` nodes, optionally all of one type.
    pub fn add_n_nodes(&self, n: usize, node_type: Option<&str>) -> Result<Graph, GraphError> {
        if n == 0 || n > MAX_BATCH_NODES {
            return Err(GraphError::Argument(format!(
                "node count must be between 1 and {}, got {}",
                MAX_BATCH_NODES, n
            )));
        }
        self.transact("add_n_nodes", Trigger::Never, |g| {
            for _ in 0..n {
                g.insert_node(NodeSpec {
                    node_type: node_type.map(str::to_string),
                    ..NodeSpec::default()
                })?;
            }
            Ok(())
        })
    }

    /// Add several nodes in one operation.
    pub fn add_nodes(&self, specs: Vec<NodeSpec>) -> Result<Graph, GraphError> {
        if specs.is_empty() {
            return Err(GraphError::Argument("no nodes given".to_string()));
        }
        self.transact("add_nodes", Trigger::Never, |g| {
            for spec in specs {
                g.insert_node(spec)?;
            }
            Ok(())
        })
    }

    /// Add a new node carrying the type and attributes of `node`.
    pub fn add_node_clone(
        &self,
        node: impl Into<NodeRef>,
        label: Option<&str>,
    ) -> Result<Graph, GraphError> {
        let node = node.into();
        self.transact("add_node_clone", Trigger::Never, |g| {
            let source = g.nodes.resolve(&node)?;
            let record = g
                .nodes
                .get(source)
                .cloned()
                .ok_or_else(|| GraphError::Reference(format!("node {} does not exist", node)))?;
            *g = g.add_node(NodeSpec {
                node_type: record.node_type,
                label: label.map(str::to_string),
                attrs: Vec::new(),
            })?;
            let clone = NodeId(g.nodes.last_id());
            let columns: Vec<String> = g.nodes.columns().to_vec();
            for column in columns {
                if let Some(value) = record.attrs.get(&column) {
                    *g = g.set_node_attrs(&[clone], &column, std::slice::from_ref(value))?;
                }
            }
            Ok(())
        })
    }

    fn remove_node_row(&mut self, node: &NodeRef) -> Result<NodeId, GraphError> {
        let id = self.nodes.resolve(node)?;
        self.nodes.remove(id);
        let nodes = &self.nodes;
        self.selection.retain_nodes(|n| nodes.contains(n));
        Ok(id)
    }

    /// Remove one node. Incident edges are kept and become dangling.
    pub fn delete_node(&self, node: impl Into<NodeRef>) -> Result<Graph, GraphError> {
        let node = node.into();
        self.transact("delete_node", Trigger::Never, |g| {
            g.remove_node_row(&node).map(|_| ())
        })
    }

    /// Remove one node together with every incident edge.
    pub fn delete_node_cascade(&self, node: impl Into<NodeRef>) -> Result<Graph, GraphError> {
        let node = node.into();
        self.transact("delete_node_cascade", Trigger::OnEdgeChange, |g| {
            let id = g.remove_node_row(&node)?;
            let incident: Vec<EdgeId> = g.edges.incident(id).map(|e| e.id).collect();
            for edge in incident {
                g.edges.remove(edge);
            }
            let edges = &g.edges;
            g.selection.retain_edges(|e| edges.contains(e));
            Ok(())
        })
    }

    /// Remove every selected node (non-cascading) and clear the selection.
    pub fn delete_nodes_ws(&self) -> Result<Graph, GraphError> {
        let Selection::Nodes(selected) = &self.selection else {
            return Err(GraphError::Precondition(
                "delete_nodes_ws requires a node selection".to_string(),
            ));
        };
        let selected = selected.clone();
        self.transact("delete_nodes_ws", Trigger::Never, |g| {
            for id in selected {
                g.nodes.remove(id);
            }
            g.selection = Selection::None;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    fn insert_edge(&mut self, spec: EdgeSpec) -> Result<EdgeId, GraphError> {
        let from = self.nodes.resolve(&spec.from)?;
        let to = self.nodes.resolve(&spec.to)?;
        let rel = spec.rel;
        let id = self.edges.insert(|id| EdgeRecord {
            id,
            from,
            to,
            rel,
            attrs: BTreeMap::new(),
        });
        for (column, value) in spec.attrs {
            self.edges.set(id, &column, value)?;
        }
        Ok(id)
    }

    /// Add one edge between existing nodes. The new edge gets id `last_edge + 1`.
    pub fn add_edge(&self, spec: EdgeSpec) -> Result<Graph, GraphError> {
        self.transact("add_edge", Trigger::OnEdgeChange, |g| {
            g.insert_edge(spec).map(|_| ())
        })
    }

    /// Add edges pairwise from `from[i]` to `to[i]`.
    pub fn add_edges(
        &self,
        from: &[NodeRef],
        to: &[NodeRef],
        rel: Option<&str>,
    ) -> Result<Graph, GraphError> {
        if from.is_empty() || from.len() != to.len() {
            return Err(GraphError::Argument(format!(
                "`from` and `to` must be non-empty and of equal length (got {} and {})",
                from.len(),
                to.len()
            )));
        }
        self.transact("add_edges", Trigger::OnEdgeChange, |g| {
            for (a, b) in from.iter().zip(to) {
                g.insert_edge(EdgeSpec {
                    from: a.clone(),
                    to: b.clone(),
                    rel: rel.map(str::to_string),
                    attrs: Vec::new(),
                })?;
            }
            Ok(())
        })
    }

    /// Add edges written as `"1->2 2->3"`, `"a--b"` or chains like `"1->2->3"`.
    pub fn add_edges_w_string(&self, edges: &str, rel: Option<&str>) -> Result<Graph, GraphError> {
        let (from, to) = parse_edge_string(edges)?;
        self.transact("add_edges_w_string", Trigger::OnEdgeChange, |g| {
            *g = g.add_edges(&from, &to, rel)?;
            Ok(())
        })
    }

    /// Add a copy of `edge` (rel and attributes) between two other nodes.
    pub fn add_edge_clone(
        &self,
        edge: EdgeId,
        from: impl Into<NodeRef>,
        to: impl Into<NodeRef>,
    ) -> Result<Graph, GraphError> {
        let (from, to) = (from.into(), to.into());
        self.transact("add_edge_clone", Trigger::OnEdgeChange, |g| {
            let record = g
                .edges
                .get(edge)
                .cloned()
                .ok_or_else(|| GraphError::Reference(format!("edge id {} does not exist", edge)))?;
            *g = g.add_edge(EdgeSpec {
                from,
                to,
                rel: record.rel,
                attrs: Vec::new(),
            })?;
            let clone = EdgeId(g.edges.last_id());
            let columns: Vec<String> = g.edges.columns().to_vec();
            for column in columns {
                if let Some(value) = record.attrs.get(&column) {
                    *g = g.set_edge_attrs(&[clone], &column, std::slice::from_ref(value))?;
                }
            }
            Ok(())
        })
    }

    /// Remove one edge by id.
    pub fn delete_edge(&self, edge: EdgeId) -> Result<Graph, GraphError> {
        self.transact("delete_edge", Trigger::OnEdgeChange, |g| {
            g.edges
                .remove(edge)
                .ok_or_else(|| GraphError::Reference(format!("edge id {} does not exist", edge)))?;
            let edges = &g.edges;
            g.selection.retain_edges(|e| edges.contains(e));
            Ok(())
        })
    }

    /// Remove every selected edge and clear the selection.
    pub fn delete_edges_ws(&self) -> Result<Graph, GraphError> {
        let Selection::Edges(selected) = &self.selection else {
            return Err(GraphError::Precondition(
                "delete_edges_ws requires an edge selection".to_string(),
            ));
        };
        let selected = selected.clone();
        self.transact("delete_edges_ws", Trigger::OnEdgeChange, |g| {
            for e in selected {
                g.edges.remove(e.edge);
            }
            g.selection = Selection::None;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Register an action at the end of the replay order.
    pub fn add_graph_action(
        &self,
        transform: Transform,
        name: Option<&str>,
    ) -> Result<Graph, GraphError> {
        self.transact("add_graph_action", Trigger::Never, |g| {
            g.actions
                .add(transform, name.map(str::to_string))
                .map(|_| ())
        })
    }

    /// Remove actions by index or by name; survivors are re-indexed.
    pub fn delete_graph_actions(&self, selector: &ActionSelector) -> Result<Graph, GraphError> {
        self.transact("delete_graph_actions", Trigger::Never, |g| {
            g.actions.delete(selector)
        })
    }

    /// Reorder actions: old index `order[i]` becomes index `i + 1`.
    pub fn reorder_graph_actions(&self, order: &[usize]) -> Result<Graph, GraphError> {
        self.transact("reorder_graph_actions", Trigger::Never, |g| {
            g.actions.reorder(order)
        })
    }

    /// Replay every registered action now.
    pub fn trigger_graph_actions(&self) -> Result<Graph, GraphError> {
        self.transact("trigger_graph_actions", Trigger::Never, |g| {
            if !g.actions.is_empty() {
                *g = g.clone().replay_actions()?;
            }
            Ok(())
        })
    }

    /// Wall-clock duration of the last logged operation.
    #[must_use]
    pub fn last_duration(&self) -> Duration {
        self.log.last().map_or(Duration::ZERO, |e| e.duration)
    }
}

/// Split an edge string into endpoint lists.
fn parse_edge_string(edges: &str) -> Result<(Vec<NodeRef>, Vec<NodeRef>), GraphError> {
    let mut from = Vec::new();
    let mut to = Vec::new();
    for token in edges
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
    {
        let chain: Vec<NodeRef> = token
            .split("->")
            .flat_map(|part| part.split("--"))
            .map(NodeRef::parse)
            .collect();
        let bad_part = chain
            .iter()
            .any(|n| matches!(n, NodeRef::Label(l) if l.is_empty()));
        if chain.len() < 2 || bad_part {
            return Err(GraphError::Argument(format!(
                "cannot parse edge `{}` (expected `a->b` or `a--b`)",
                token
            )));
        }
        for pair in chain.windows(2) {
            from.push(pair[0].clone());
            to.push(pair[1].clone());
        }
    }
    if from.is_empty() {
        return Err(GraphError::Argument("no edges in edge string".to_string()));
    }
    Ok((from, to))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Assignment, NodeMetric};
    use crate::algo::DegreeMode;

    fn triangle() -> Graph {
        Graph::new()
            .add_n_nodes(3, Some("a"))
            .expect("nodes")
            .add_edges_w_string("1->2->3->1", None)
            .expect("edges")
    }

    #[test]
    fn new_graph_has_create_entry() {
        let g = Graph::new();
        let log = g.get_graph_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].function_name, "create_graph");
        assert_eq!(log.entries()[0].version_id, 1);
    }

    #[test]
    fn add_edge_returns_next_edge_id() {
        let g = triangle();
        let before = g.last_edge();
        let g = g.add_edge(EdgeSpec::new(1u64, 3u64)).expect("edge");
        assert_eq!(g.last_edge(), before + 1);
        assert!(g.edges().contains(EdgeId(before + 1)));
    }

    #[test]
    fn add_edge_missing_endpoint_leaves_graph_untouched() {
        let g = triangle();
        let err = g.add_edge(EdgeSpec::new(1u64, 99u64)).expect_err("missing");
        assert!(matches!(err, GraphError::Reference(_)));
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.get_graph_log().last_version(), 3);
    }

    #[test]
    fn ids_not_reused_after_delete() {
        let g = triangle().delete_node(NodeId(3)).expect("delete");
        let g = g.add_node(NodeSpec::new()).expect("add");
        assert_eq!(g.last_node(), 4);
        assert!(!g.nodes().contains(NodeId(3)));
    }

    #[test]
    fn delete_node_keeps_edges_cascade_removes_them() {
        let plain = triangle().delete_node(NodeId(1)).expect("delete");
        assert_eq!(plain.edge_count(), 3);
        let cascade = triangle().delete_node_cascade(NodeId(1)).expect("cascade");
        assert_eq!(cascade.edge_count(), 1);
        let entry = cascade.get_graph_log().last().expect("entry");
        assert_eq!(entry.node_delta, Some(-1));
        assert_eq!(entry.edge_delta, Some(-2));
    }

    #[test]
    fn composite_logs_one_entry() {
        let g = triangle()
            .set_edge_attrs(&[EdgeId(1)], "w", &[Value::Int(5)])
            .expect("set");
        let version = g.get_graph_log().last_version();
        let g = g.add_edge_clone(EdgeId(1), 3u64, 2u64).expect("clone");
        let log = g.get_graph_log();
        assert_eq!(log.last_version(), version + 1);
        assert_eq!(log.last().expect("entry").function_name, "add_edge_clone");
        assert_eq!(g.edges().value(EdgeId(4), "w"), Some(Value::Int(5)));
    }

    #[test]
    fn add_node_clone_copies_type_and_attrs() {
        let g = triangle()
            .set_node_attrs(&[NodeId(2)], "score", &[Value::Float(1.5)])
            .expect("set")
            .add_node_clone(NodeId(2), Some("copy"))
            .expect("clone");
        let clone = NodeId(4);
        assert_eq!(g.nodes().value(clone, "type"), Some(Value::from("a")));
        assert_eq!(g.nodes().value(clone, "label"), Some(Value::from("copy")));
        assert_eq!(g.nodes().value(clone, "score"), Some(Value::Float(1.5)));
        assert_eq!(g.get_graph_log().entries_for("add_node_clone").count(), 1);
    }

    #[test]
    fn trigger_replays_on_edge_change_only() {
        let g = triangle()
            .add_graph_action(
                Transform::SetNodeMetric {
                    column: "deg".to_string(),
                    metric: NodeMetric::Degree(DegreeMode::Total),
                    directed: None,
                },
                Some("degree"),
            )
            .expect("action");
        // No edge change: the column is not computed yet.
        let g = g.add_node(NodeSpec::new()).expect("node");
        assert!(!g.nodes().has_column("deg"));

        let g = g.add_edge(EdgeSpec::new(4u64, 1u64)).expect("edge");
        assert_eq!(g.nodes().value(NodeId(1), "deg"), Some(Value::Int(3)));
        assert_eq!(g.nodes().value(NodeId(4), "deg"), Some(Value::Int(1)));
        assert_eq!(g.get_graph_log().last().expect("entry").function_name, "add_edge");
    }

    #[test]
    fn only_cascading_delete_replays() {
        let g = triangle()
            .add_graph_action(
                Transform::SetNodeMetric {
                    column: "deg".to_string(),
                    metric: NodeMetric::Degree(DegreeMode::Total),
                    directed: None,
                },
                Some("degree"),
            )
            .expect("action");

        let kept = g.delete_node(3u64).expect("delete");
        assert_eq!(kept.edge_count(), g.edge_count());
        assert!(!kept.nodes().has_column("deg"));

        let cascaded = g.delete_node_cascade(3u64).expect("cascade");
        assert!(cascaded.edge_count() < g.edge_count());
        assert!(cascaded.nodes().has_column("deg"));
    }

    #[test]
    fn replay_order_follows_index() {
        let g = triangle()
            .add_graph_action(
                Transform::MutateNodeAttrs(vec![Assignment::parse("x", "1").expect("expr")]),
                Some("first"),
            )
            .expect("a1")
            .add_graph_action(
                Transform::MutateNodeAttrs(vec![Assignment::parse("y", "x + 1").expect("expr")]),
                Some("second"),
            )
            .expect("a2")
            .trigger_graph_actions()
            .expect("trigger");
        assert_eq!(g.nodes().value(NodeId(1), "y"), Some(Value::Int(2)));
        assert!(g.get_graph_log().entries().iter().all(|e| e.function_name != "mutate_node_attrs"));
    }

    #[test]
    fn edge_string_parsing() {
        let (from, to) = parse_edge_string("1->2 a--b, 3->4->5").expect("parse");
        assert_eq!(from.len(), 4);
        assert_eq!(to[1], NodeRef::from("b"));
        assert!(parse_edge_string("1-2").is_err());
        assert!(parse_edge_string("  ").is_err());
    }

    #[test]
    fn add_edges_length_mismatch() {
        let g = triangle();
        let err = g
            .add_edges(&[NodeRef::from(1u64)], &[], None)
            .expect_err("mismatch");
        assert!(matches!(err, GraphError::Argument(_)));
    }

    #[test]
    fn delete_ws_requires_selection() {
        let g = triangle();
        assert!(matches!(g.delete_nodes_ws(), Err(GraphError::Precondition(_))));
        assert!(matches!(g.delete_edges_ws(), Err(GraphError::Precondition(_))));
    }
}
