//! # Core Type Definitions
//!
//! This module contains all core types for the propgraph engine:
//! - Node and edge identifiers (`NodeId`, `EdgeId`, `NodeRef`)
//! - Cell values (`Value`)
//! - Error types (`GraphError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! Identifiers implement `Ord` so that every table, selection and index can
//! be kept in `BTreeMap`/`BTreeSet` with a stable iteration order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a node row.
///
/// Assigned from the node table's monotonic counter starting at 1.
/// An id is never reused, even after the node is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of an edge row. Same discipline as [`NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for EdgeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A reference to a node, either by id or by its (unique) label.
///
/// Label references must resolve to exactly one node; an unknown or
/// ambiguous label is a `GraphError::Reference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Id(NodeId),
    Label(String),
}

impl NodeRef {
    /// Parse a textual endpoint: digits are ids, anything else is a label.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<u64>() {
            Ok(id) => Self::Id(NodeId(id)),
            Err(_) => Self::Label(s.trim().to_string()),
        }
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

impl From<u64> for NodeRef {
    fn from(id: u64) -> Self {
        Self::Id(NodeId(id))
    }
}

impl From<&str> for NodeRef {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Label(label) => write!(f, "'{}'", label),
        }
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A single attribute cell.
///
/// `Missing` is the absent value: cells that were never set read as
/// `Missing`, and arithmetic or comparisons involving it propagate it.
/// A `Float(NaN)` is treated as missing as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Returns `true` for `Missing` and for `Float(NaN)`.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value (`Int` and `Float` only).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// Convert to an optional string for the reserved text columns
    /// (`type`, `label`, `rel`). `Missing` maps to `None`.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Str(s) => Some(s),
            other if other.is_missing() => None,
            other => Some(other.to_string()),
        }
    }

    /// Partial ordering between two non-missing values of compatible kinds.
    ///
    /// Ints and floats compare numerically; strings lexicographically;
    /// bools with `false < true`. Anything else is incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "NA"),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) if x.is_nan() => write!(f, "NA"),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The graph object is malformed.
    Validation,
    /// A required selection, table content or action registry is missing.
    Precondition,
    /// Unknown node/edge id, label, column, or action.
    Reference,
    /// Bad argument: lengths, names, protected targets, expressions.
    Argument,
    /// Encoding or storage failure.
    Io,
}

/// Errors that can occur in the propgraph engine.
///
/// - No silent failures
/// - Every fallible operation returns `Result<T, GraphError>`
/// - A failed operation leaves the input graph untouched
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The graph failed an internal consistency check.
    #[error("Invalid graph: {0}")]
    Validation(String),

    /// The operation requires state the graph does not have.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// An id, label, column or action name does not exist.
    #[error("Unknown reference: {0}")]
    Reference(String),

    /// An argument is malformed or inconsistent.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A reserved column was used where it is not allowed.
    #[error("Protected column: `{0}` cannot be used here")]
    ProtectedColumn(String),

    /// An aggregator name outside `{sum, min, max, mean, median}`.
    #[error("Unknown aggregator: `{0}` (expected sum, min, max, mean or median)")]
    UnknownAggregator(String),

    /// An expression failed to parse or evaluate.
    #[error("Expression error: {0}")]
    Expression(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl GraphError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Reference(_) => ErrorKind::Reference,
            Self::Argument(_)
            | Self::ProtectedColumn(_)
            | Self::UnknownAggregator(_)
            | Self::Expression(_) => ErrorKind::Argument,
            Self::SerializationError(_) | Self::IoError(_) => ErrorKind::Io,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
