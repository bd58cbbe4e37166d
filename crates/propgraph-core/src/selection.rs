//! # Selection State
//!
//! The active cursor of a graph: a set of node ids, a set of edges, or
//! nothing. The two kinds are mutually exclusive by construction, and an
//! empty set is normalized to [`Selection::None`].

use crate::{EdgeId, GraphError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One selected edge with its endpoints at selection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeSelection {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

/// The active subset of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    None,
    Nodes(BTreeSet<NodeId>),
    Edges(BTreeSet<EdgeSelection>),
}

impl Selection {
    /// Node selection, normalizing empty sets to `None`.
    #[must_use]
    pub fn nodes(ids: BTreeSet<NodeId>) -> Self {
        if ids.is_empty() {
            Self::None
        } else {
            Self::Nodes(ids)
        }
    }

    /// Edge selection, normalizing empty sets to `None`.
    #[must_use]
    pub fn edges(edges: BTreeSet<EdgeSelection>) -> Self {
        if edges.is_empty() {
            Self::None
        } else {
            Self::Edges(edges)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        match self {
            Self::Nodes(ids) => ids.clone(),
            _ => BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn edge_ids(&self) -> BTreeSet<EdgeId> {
        match self {
            Self::Edges(edges) => edges.iter().map(|e| e.edge).collect(),
            _ => BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn selected_edges(&self) -> BTreeSet<EdgeSelection> {
        match self {
            Self::Edges(edges) => edges.clone(),
            _ => BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Nodes(ids) => ids.len(),
            Self::Edges(edges) => edges.len(),
        }
    }

    /// Drop node ids that no longer exist.
    pub(crate) fn retain_nodes(&mut self, keep: impl Fn(NodeId) -> bool) {
        if let Self::Nodes(ids) = self {
            ids.retain(|id| keep(*id));
            if ids.is_empty() {
                *self = Self::None;
            }
        }
    }

    /// Drop edges that no longer exist.
    pub(crate) fn retain_edges(&mut self, keep: impl Fn(EdgeId) -> bool) {
        if let Self::Edges(edges) = self {
            edges.retain(|e| keep(e.edge));
            if edges.is_empty() {
                *self = Self::None;
            }
        }
    }
}

// =============================================================================
// SET OPERATIONS
// =============================================================================

/// How a new candidate set combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOp {
    #[default]
    Union,
    Intersect,
    Difference,
}

impl SetOp {
    /// Combine `current` with `candidates`.
    #[must_use]
    pub fn apply<T: Ord + Clone>(self, current: &BTreeSet<T>, candidates: &BTreeSet<T>) -> BTreeSet<T> {
        match self {
            Self::Union => current.union(candidates).cloned().collect(),
            Self::Intersect => current.intersection(candidates).cloned().collect(),
            Self::Difference => current.difference(candidates).cloned().collect(),
        }
    }
}

impl FromStr for SetOp {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "union" => Ok(Self::Union),
            "intersect" => Ok(Self::Intersect),
            "difference" => Ok(Self::Difference),
            other => Err(GraphError::Argument(format!(
                "unknown set operation `{}` (expected union, intersect or difference)",
                other
            ))),
        }
    }
}

impl fmt::Display for SetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Union => "union",
            Self::Intersect => "intersect",
            Self::Difference => "difference",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> BTreeSet<NodeId> {
        raw.iter().map(|i| NodeId(*i)).collect()
    }

    #[test]
    fn empty_sets_normalize_to_none() {
        assert_eq!(Selection::nodes(BTreeSet::new()), Selection::None);
        assert_eq!(Selection::edges(BTreeSet::new()), Selection::None);
    }

    #[test]
    fn set_ops() {
        let current = ids(&[1, 2, 3]);
        let cand = ids(&[3, 4]);
        assert_eq!(SetOp::Union.apply(&current, &cand), ids(&[1, 2, 3, 4]));
        assert_eq!(SetOp::Intersect.apply(&current, &cand), ids(&[3]));
        assert_eq!(SetOp::Difference.apply(&current, &cand), ids(&[1, 2]));
    }

    #[test]
    fn unknown_set_op_is_argument_error() {
        assert!(matches!("xor".parse::<SetOp>(), Err(GraphError::Argument(_))));
        assert_eq!("intersect".parse::<SetOp>().expect("parse"), SetOp::Intersect);
    }

    #[test]
    fn retain_collapses_to_none() {
        let mut sel = Selection::nodes(ids(&[1]));
        sel.retain_nodes(|_| false);
        assert!(sel.is_empty());
    }
}
