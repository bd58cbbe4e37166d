//! # Traversals
//!
//! Move the active selection across the graph:
//!
//! | operation | from → to |
//! |---|---|
//! | `trav_out`, `trav_in`, `trav_both` | nodes → adjacent nodes |
//! | `trav_out_edge`, `trav_in_edge`, `trav_both_edge` | nodes → incident edges |
//! | `trav_out_node`, `trav_in_node` | edges → head / tail nodes |
//! | `trav_reverse_edge` | edges → their reverse edges |
//!
//! Destinations can be filtered with a predicate. A traversal that reaches
//! nothing is a no-op: the graph is returned unchanged and nothing is
//! logged. On an undirected graph `out` and `in` both behave as `both`.
//!
//! ## Attribute copy
//!
//! With `copy_attrs_from`, values travel with the traversal. Values arriving
//! at a node are aggregated (`sum`, `min`, `max`, `mean`, `median`); a value
//! arriving at an edge from a single node is copied as is. A destination
//! cell that already holds a value keeps it: aggregates only fill `Missing`.

use crate::expr::Expr;
use crate::graph::{Graph, Trigger};
use crate::primitives::IMMUTABLE_COLUMNS;
use crate::selection::{EdgeSelection, Selection};
use crate::table::{Record, Table};
use crate::{EdgeId, GraphError, NodeId, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// AGGREGATION
// =============================================================================

/// How values arriving at one destination are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    #[default]
    Sum,
    Min,
    Max,
    Mean,
    Median,
}

impl FromStr for Aggregator {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(GraphError::UnknownAggregator(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Median => "median",
        })
    }
}

impl Aggregator {
    /// Combine `values`, ignoring missing and non-numeric ones.
    ///
    /// Returns `Missing` when nothing numeric remains. Sums, minima and
    /// maxima of integers stay integers.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn aggregate(self, values: &[Value]) -> Value {
        let ints: Vec<i64> = values.iter().filter_map(Value::as_i64).collect();
        let floats: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if floats.is_empty() {
            return Value::Missing;
        }
        let all_int = ints.len() == floats.len();

        match self {
            Self::Sum if all_int => ints
                .iter()
                .try_fold(0i64, |acc, x| acc.checked_add(*x))
                .map_or_else(|| Value::Float(floats.iter().sum()), Value::Int),
            Self::Min if all_int => ints.iter().min().copied().map_or(Value::Missing, Value::Int),
            Self::Max if all_int => ints.iter().max().copied().map_or(Value::Missing, Value::Int),
            Self::Sum => Value::Float(floats.iter().sum()),
            Self::Min => Value::Float(floats.iter().copied().fold(f64::INFINITY, f64::min)),
            Self::Max => Value::Float(floats.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Self::Mean => Value::Float(floats.iter().sum::<f64>() / floats.len() as f64),
            Self::Median => {
                let mut sorted = floats;
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                Value::Float(if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                })
            }
        }
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Filter and attribute-copy options shared by all traversals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravOptions {
    /// Predicate evaluated on each destination row.
    pub conditions: Option<Expr>,
    /// Source column whose values travel with the traversal.
    pub copy_attrs_from: Option<String>,
    /// Destination column name; defaults to `copy_attrs_from`.
    pub copy_attrs_as: Option<String>,
    pub agg: Aggregator,
}

impl TravOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Expr) -> Self {
        self.conditions = Some(conditions);
        self
    }

    #[must_use]
    pub fn copy_attrs(mut self, from: impl Into<String>, agg: Aggregator) -> Self {
        self.copy_attrs_from = Some(from.into());
        self.agg = agg;
        self
    }

    #[must_use]
    pub fn copy_attrs_as(mut self, alias: impl Into<String>) -> Self {
        self.copy_attrs_as = Some(alias.into());
        self
    }

    /// Resolve `(source column, destination column)` against the source table.
    fn copy_plan<R: Record>(&self, source: &Table<R>) -> Result<Option<(String, String)>, GraphError> {
        let Some(from) = &self.copy_attrs_from else {
            if self.copy_attrs_as.is_some() {
                return Err(GraphError::Argument(
                    "copy_attrs_as requires copy_attrs_from".to_string(),
                ));
            }
            return Ok(None);
        };
        if !source.has_column(from) {
            return Err(GraphError::Reference(format!(
                "{} column `{}` does not exist",
                R::KIND,
                from
            )));
        }
        let alias = self.copy_attrs_as.clone().unwrap_or_else(|| from.clone());
        if IMMUTABLE_COLUMNS.contains(&alias.as_str()) {
            return Err(GraphError::ProtectedColumn(alias));
        }
        Ok(Some((from.clone(), alias)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Out,
    In,
    Both,
}

impl Dir {
    fn follows_out(self) -> bool {
        matches!(self, Self::Out | Self::Both)
    }

    fn follows_in(self) -> bool {
        matches!(self, Self::In | Self::Both)
    }
}

/// Destinations that pass `conditions`.
fn filter_destinations<R: Record>(
    table: &Table<R>,
    candidates: impl IntoIterator<Item = R::Id>,
    conditions: Option<&Expr>,
) -> Result<BTreeSet<R::Id>, GraphError> {
    let mut out = BTreeSet::new();
    for id in candidates {
        let Some(row) = table.row(id) else { continue };
        if conditions.map_or(Ok(true), |c| c.matches(&row))? {
            out.insert(id);
        }
    }
    Ok(out)
}

/// Write combined values into `alias`, filling only `Missing` cells.
fn merge_into<R: Record>(
    table: &mut Table<R>,
    alias: &str,
    values: BTreeMap<R::Id, Value>,
) -> Result<(), GraphError> {
    table.ensure_column(alias)?;
    for (id, value) in values {
        let current = table.value(id, alias).unwrap_or_default();
        if current.is_missing() && !value.is_missing() {
            table.set(id, alias, value)?;
        }
    }
    Ok(())
}

impl Graph {
    fn effective(&self, dir: Dir) -> Dir {
        if self.options.directed { dir } else { Dir::Both }
    }

    fn require_node_selection(&self, op: &str) -> Result<BTreeSet<NodeId>, GraphError> {
        match &self.selection {
            Selection::Nodes(ids) => Ok(ids.clone()),
            _ => Err(GraphError::Precondition(format!(
                "{} requires a node selection",
                op
            ))),
        }
    }

    fn require_edge_selection(&self, op: &str) -> Result<BTreeSet<EdgeSelection>, GraphError> {
        match &self.selection {
            Selection::Edges(edges) => Ok(edges.clone()),
            _ => Err(GraphError::Precondition(format!(
                "{} requires an edge selection",
                op
            ))),
        }
    }

    /// `(edge, source node, other endpoint)` for every edge leaving the
    /// selected nodes in direction `dir`. Edges with a deleted endpoint are skipped.
    fn node_hops(&self, sources: &BTreeSet<NodeId>, dir: Dir) -> BTreeSet<(EdgeId, NodeId, NodeId)> {
        let mut hops = BTreeSet::new();
        for e in self.edges.iter() {
            if !self.nodes.contains(e.from) || !self.nodes.contains(e.to) {
                continue;
            }
            if dir.follows_out() && sources.contains(&e.from) {
                hops.insert((e.id, e.from, e.to));
            }
            if dir.follows_in() && sources.contains(&e.to) {
                hops.insert((e.id, e.to, e.from));
            }
        }
        hops
    }

    // -------------------------------------------------------------------------
    // nodes -> nodes
    // -------------------------------------------------------------------------

    fn trav_nodes(&self, function_name: &str, dir: Dir, opts: &TravOptions) -> Result<Graph, GraphError> {
        let sources = self.require_node_selection(function_name)?;
        let copy = opts.copy_plan(&self.nodes)?;
        let hops = self.node_hops(&sources, self.effective(dir));
        let dests = filter_destinations(
            &self.nodes,
            hops.iter().map(|(_, _, dest)| *dest),
            opts.conditions.as_ref(),
        )?;
        if dests.is_empty() {
            return Ok(self.clone());
        }

        let merged = copy.map(|(from, alias)| {
            let mut arriving: BTreeMap<NodeId, Vec<Value>> = BTreeMap::new();
            for (_, source, dest) in &hops {
                if dests.contains(dest) {
                    arriving
                        .entry(*dest)
                        .or_default()
                        .push(self.nodes.value(*source, &from).unwrap_or_default());
                }
            }
            let values: BTreeMap<NodeId, Value> = arriving
                .into_iter()
                .map(|(id, vals)| (id, opts.agg.aggregate(&vals)))
                .collect();
            (alias, values)
        });

        self.transact(function_name, Trigger::Never, |g| {
            g.selection = Selection::nodes(dests);
            if let Some((alias, values)) = merged {
                merge_into(&mut g.nodes, &alias, values)?;
            }
            Ok(())
        })
    }

    /// Move from selected nodes to their successors.
    pub fn trav_out(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_nodes("trav_out", Dir::Out, opts)
    }

    /// Move from selected nodes to their predecessors.
    pub fn trav_in(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_nodes("trav_in", Dir::In, opts)
    }

    /// Move from selected nodes to all neighbors.
    pub fn trav_both(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_nodes("trav_both", Dir::Both, opts)
    }

    // -------------------------------------------------------------------------
    // nodes -> edges
    // -------------------------------------------------------------------------

    fn trav_edges(&self, function_name: &str, dir: Dir, opts: &TravOptions) -> Result<Graph, GraphError> {
        let sources = self.require_node_selection(function_name)?;
        let copy = opts.copy_plan(&self.nodes)?;
        let hops = self.node_hops(&sources, self.effective(dir));
        let dests = filter_destinations(
            &self.edges,
            hops.iter().map(|(edge, _, _)| *edge),
            opts.conditions.as_ref(),
        )?;
        if dests.is_empty() {
            return Ok(self.clone());
        }

        let merged = copy.map(|(from, alias)| {
            let mut arriving: BTreeMap<EdgeId, Vec<Value>> = BTreeMap::new();
            for (edge, source, _) in &hops {
                if dests.contains(edge) {
                    arriving
                        .entry(*edge)
                        .or_default()
                        .push(self.nodes.value(*source, &from).unwrap_or_default());
                }
            }
            let values: BTreeMap<EdgeId, Value> = arriving
                .into_iter()
                .map(|(id, mut vals)| {
                    let value = if vals.len() == 1 {
                        vals.pop().unwrap_or_default()
                    } else {
                        opts.agg.aggregate(&vals)
                    };
                    (id, value)
                })
                .collect();
            (alias, values)
        });

        let selected: BTreeSet<EdgeSelection> = dests
            .iter()
            .filter_map(|id| self.edges.get(*id))
            .map(EdgeSelection::from)
            .collect();
        self.transact(function_name, Trigger::Never, |g| {
            g.selection = Selection::edges(selected);
            if let Some((alias, values)) = merged {
                merge_into(&mut g.edges, &alias, values)?;
            }
            Ok(())
        })
    }

    /// Move from selected nodes to their outgoing edges.
    pub fn trav_out_edge(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_edges("trav_out_edge", Dir::Out, opts)
    }

    /// Move from selected nodes to their incoming edges.
    pub fn trav_in_edge(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_edges("trav_in_edge", Dir::In, opts)
    }

    /// Move from selected nodes to all incident edges.
    pub fn trav_both_edge(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_edges("trav_both_edge", Dir::Both, opts)
    }

    // -------------------------------------------------------------------------
    // edges -> nodes
    // -------------------------------------------------------------------------

    fn trav_edge_endpoints(
        &self,
        function_name: &str,
        to_head: bool,
        opts: &TravOptions,
    ) -> Result<Graph, GraphError> {
        let selected = self.require_edge_selection(function_name)?;
        let copy = opts.copy_plan(&self.edges)?;
        let hops: Vec<(EdgeId, NodeId)> = selected
            .iter()
            .filter_map(|s| self.edges.get(s.edge))
            .map(|e| (e.id, if to_head { e.to } else { e.from }))
            .filter(|(_, node)| self.nodes.contains(*node))
            .collect();
        let dests = filter_destinations(
            &self.nodes,
            hops.iter().map(|(_, node)| *node),
            opts.conditions.as_ref(),
        )?;
        if dests.is_empty() {
            return Ok(self.clone());
        }

        let merged = copy.map(|(from, alias)| {
            let mut arriving: BTreeMap<NodeId, Vec<Value>> = BTreeMap::new();
            for (edge, node) in &hops {
                if dests.contains(node) {
                    arriving
                        .entry(*node)
                        .or_default()
                        .push(self.edges.value(*edge, &from).unwrap_or_default());
                }
            }
            let values: BTreeMap<NodeId, Value> = arriving
                .into_iter()
                .map(|(id, vals)| (id, opts.agg.aggregate(&vals)))
                .collect();
            (alias, values)
        });

        self.transact(function_name, Trigger::Never, |g| {
            g.selection = Selection::nodes(dests);
            if let Some((alias, values)) = merged {
                merge_into(&mut g.nodes, &alias, values)?;
            }
            Ok(())
        })
    }

    /// Move from selected edges to their `to` nodes.
    pub fn trav_out_node(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_edge_endpoints("trav_out_node", true, opts)
    }

    /// Move from selected edges to their `from` nodes.
    pub fn trav_in_node(&self, opts: &TravOptions) -> Result<Graph, GraphError> {
        self.trav_edge_endpoints("trav_in_node", false, opts)
    }

    // -------------------------------------------------------------------------
    // edges -> reverse edges
    // -------------------------------------------------------------------------

    /// Move from selected edges `a -> b` to existing edges `b -> a`.
    ///
    /// With `add_to_selection` the reverse edges are added to the current
    /// selection instead of replacing it.
    pub fn trav_reverse_edge(
        &self,
        conditions: Option<&Expr>,
        add_to_selection: bool,
    ) -> Result<Graph, GraphError> {
        let selected = self.require_edge_selection("trav_reverse_edge")?;
        let pairs: BTreeSet<(NodeId, NodeId)> = selected
            .iter()
            .filter_map(|s| self.edges.get(s.edge))
            .map(|e| (e.to, e.from))
            .collect();
        let candidates = self
            .edges
            .iter()
            .filter(|e| pairs.contains(&(e.from, e.to)))
            .filter(|e| self.nodes.contains(e.from) && self.nodes.contains(e.to))
            .map(|e| e.id);
        let dests = filter_destinations(&self.edges, candidates, conditions)?;
        if dests.is_empty() {
            return Ok(self.clone());
        }

        let mut edges: BTreeSet<EdgeSelection> = dests
            .iter()
            .filter_map(|id| self.edges.get(*id))
            .map(EdgeSelection::from)
            .collect();
        if add_to_selection {
            edges.extend(selected);
        }
        self.transact("trav_reverse_edge", Trigger::Never, |g| {
            g.selection = Selection::edges(edges);
            Ok(())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphOptions, NodeSpec};
    use crate::selection::SetOp;

    /// 1 -> 2, 1 -> 3, 2 -> 3, 3 -> 4
    fn graph() -> Graph {
        Graph::new()
            .add_nodes(
                [10, 20, 30, 40]
                    .iter()
                    .map(|v| NodeSpec::new().with_attr("v", *v as i64))
                    .collect(),
            )
            .expect("nodes")
            .add_edges_w_string("1->2 1->3 2->3 3->4", None)
            .expect("edges")
    }

    fn select(g: &Graph, ids: &[u64]) -> Graph {
        let ids: Vec<NodeId> = ids.iter().map(|i| NodeId(*i)).collect();
        g.select_nodes_by_id(&ids, SetOp::Union).expect("select")
    }

    #[test]
    fn out_in_both() {
        let g = select(&graph(), &[1]);
        let out = g.trav_out(&TravOptions::new()).expect("out");
        assert_eq!(out.get_selected_node_ids(), vec![NodeId(2), NodeId(3)]);
        let g = select(&graph(), &[3]);
        let inn = g.trav_in(&TravOptions::new()).expect("in");
        assert_eq!(inn.get_selected_node_ids(), vec![NodeId(1), NodeId(2)]);
        let both = g.trav_both(&TravOptions::new()).expect("both");
        assert_eq!(both.get_selected_node_ids(), vec![NodeId(1), NodeId(2), NodeId(4)]);
    }

    #[test]
    fn empty_result_is_a_noop() {
        let g = select(&graph(), &[4]);
        let after = g.trav_out(&TravOptions::new()).expect("noop");
        assert_eq!(after, g);
        let filtered = select(&graph(), &[1])
            .trav_out(&TravOptions::new().with_conditions(Expr::parse("v > 100").expect("expr")))
            .expect("noop");
        assert_eq!(filtered.get_selected_node_ids(), vec![NodeId(1)]);
    }

    #[test]
    fn missing_selection_is_precondition() {
        let err = graph().trav_out(&TravOptions::new()).expect_err("no selection");
        assert!(matches!(err, GraphError::Precondition(_)));
        let err = select(&graph(), &[1])
            .trav_out_node(&TravOptions::new())
            .expect_err("needs edges");
        assert!(matches!(err, GraphError::Precondition(_)));
    }

    #[test]
    fn aggregated_copy_fills_only_missing() {
        // Node 3 receives 10 (from 1) and 20 (from 2); node 2 receives 10.
        let g = graph()
            .set_node_attrs(&[NodeId(2)], "acc", &[Value::Int(5)])
            .expect("preset");
        let g = select(&g, &[1, 2])
            .trav_out(&TravOptions::new().copy_attrs("v", Aggregator::Sum).copy_attrs_as("acc"))
            .expect("trav");
        assert_eq!(g.nodes().value(NodeId(2), "acc"), Some(Value::Int(5)));
        assert_eq!(g.nodes().value(NodeId(3), "acc"), Some(Value::Int(30)));
    }

    #[test]
    fn node_to_edge_copies_origin_value() {
        let g = select(&graph(), &[1])
            .trav_out_edge(&TravOptions::new().copy_attrs("v", Aggregator::Sum))
            .expect("trav");
        assert_eq!(g.get_selected_edge_ids(), vec![EdgeId(1), EdgeId(2)]);
        assert_eq!(g.edges().value(EdgeId(2), "v"), Some(Value::Int(10)));
    }

    #[test]
    fn edge_to_node_aggregates_edge_values() {
        let g = graph()
            .set_edge_attrs(&[EdgeId(2), EdgeId(3)], "w", &[Value::Float(1.0), Value::Float(3.0)])
            .expect("weights")
            .select_edges_by_edge_id(&[EdgeId(2), EdgeId(3)], SetOp::Union)
            .expect("select")
            .trav_out_node(&TravOptions::new().copy_attrs("w", Aggregator::Mean))
            .expect("trav");
        assert_eq!(g.get_selected_node_ids(), vec![NodeId(3)]);
        assert_eq!(g.nodes().value(NodeId(3), "w"), Some(Value::Float(2.0)));
    }

    #[test]
    fn protected_alias_rejected() {
        let err = select(&graph(), &[1])
            .trav_out(&TravOptions::new().copy_attrs("v", Aggregator::Max).copy_attrs_as("id"))
            .expect_err("protected");
        assert!(matches!(err, GraphError::ProtectedColumn(_)));
    }

    #[test]
    fn undirected_out_acts_as_both() {
        let g = Graph::with_options(GraphOptions {
            directed: false,
            name: None,
        })
        .add_n_nodes(3, None)
        .expect("nodes")
        .add_edges_w_string("1--2 2--3", None)
        .expect("edges");
        let g = select(&g, &[2]).trav_out(&TravOptions::new()).expect("trav");
        assert_eq!(g.get_selected_node_ids(), vec![NodeId(1), NodeId(3)]);
    }

    #[test]
    fn reverse_edges() {
        let g = graph()
            .add_edges_w_string("2->1", None)
            .expect("reverse")
            .select_edges_by_edge_id(&[EdgeId(1)], SetOp::Union)
            .expect("select");
        let rev = g.trav_reverse_edge(None, false).expect("rev");
        assert_eq!(rev.get_selected_edge_ids(), vec![EdgeId(5)]);
        let both = g.trav_reverse_edge(None, true).expect("rev");
        assert_eq!(both.get_selected_edge_ids(), vec![EdgeId(1), EdgeId(5)]);
    }

    #[test]
    fn aggregators() {
        let vals = [Value::Int(5), Value::Missing, Value::from("x"), Value::Int(1), Value::Int(3)];
        assert_eq!(Aggregator::Sum.aggregate(&vals), Value::Int(9));
        assert_eq!(Aggregator::Min.aggregate(&vals), Value::Int(1));
        assert_eq!(Aggregator::Median.aggregate(&vals), Value::Float(3.0));
        assert_eq!(Aggregator::Mean.aggregate(&[Value::Missing]), Value::Missing);
        assert!(matches!("avg".parse::<Aggregator>(), Err(GraphError::UnknownAggregator(_))));
    }
}
