//! # Node and Edge Tables
//!
//! Columnar row storage for the graph. Each table holds:
//! - rows keyed by id (`BTreeMap`, so iteration is ordered by id)
//! - the ordered list of user attribute columns (first-creation order)
//! - the monotonic id counter (`last_id`)
//!
//! Reserved columns (`id, type, label` / `id, from, to, rel`) live as
//! typed fields on the records; user attributes live in a sparse map where
//! an absent key reads as `Value::Missing`.
//!
//! Counters are only advanced by [`Table::insert`]. Removing a row never
//! lowers them, so ids are never reused.

use crate::expr::RowAccess;
use crate::primitives::{
    EDGE_RESERVED_COLUMNS, IMMUTABLE_COLUMNS, NODE_RESERVED_COLUMNS, validate_column_name,
};
use crate::{EdgeId, GraphError, NodeId, NodeRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A row type stored in a [`Table`].
pub trait Record: Clone + fmt::Debug {
    type Id: Copy + Ord + fmt::Debug + fmt::Display + From<u64>;

    /// Reserved leading columns, in snapshot order.
    const RESERVED: &'static [&'static str];

    /// Human-readable row kind for error messages.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    /// Value of a reserved column, `None` if `column` is not reserved.
    fn reserved(&self, column: &str) -> Option<Value>;

    /// Write a reserved column. Immutable columns are rejected.
    fn set_reserved(&mut self, column: &str, value: Value) -> Result<(), GraphError>;

    fn attrs(&self) -> &BTreeMap<String, Value>;

    fn attrs_mut(&mut self) -> &mut BTreeMap<String, Value>;

    fn is_reserved(column: &str) -> bool {
        Self::RESERVED.contains(&column)
    }
}

/// A node row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub node_type: Option<String>,
    pub label: Option<String>,
    pub attrs: BTreeMap<String, Value>,
}

/// An edge row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub rel: Option<String>,
    pub attrs: BTreeMap<String, Value>,
}

impl Record for NodeRecord {
    type Id = NodeId;
    const RESERVED: &'static [&'static str] = &NODE_RESERVED_COLUMNS;
    const KIND: &'static str = "node";

    fn id(&self) -> NodeId {
        self.id
    }

    fn reserved(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Int(self.id.0 as i64)),
            "type" => Some(Value::from(self.node_type.clone())),
            "label" => Some(Value::from(self.label.clone())),
            _ => None,
        }
    }

    fn set_reserved(&mut self, column: &str, value: Value) -> Result<(), GraphError> {
        match column {
            "type" => self.node_type = value.into_text(),
            "label" => self.label = value.into_text(),
            other => return Err(GraphError::ProtectedColumn(other.to_string())),
        }
        Ok(())
    }

    fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.attrs
    }
}

impl Record for EdgeRecord {
    type Id = EdgeId;
    const RESERVED: &'static [&'static str] = &EDGE_RESERVED_COLUMNS;
    const KIND: &'static str = "edge";

    fn id(&self) -> EdgeId {
        self.id
    }

    fn reserved(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Int(self.id.0 as i64)),
            "from" => Some(Value::Int(self.from.0 as i64)),
            "to" => Some(Value::Int(self.to.0 as i64)),
            "rel" => Some(Value::from(self.rel.clone())),
            _ => None,
        }
    }

    fn set_reserved(&mut self, column: &str, value: Value) -> Result<(), GraphError> {
        match column {
            "rel" => self.rel = value.into_text(),
            other => return Err(GraphError::ProtectedColumn(other.to_string())),
        }
        Ok(())
    }

    fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.attrs
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// Ordered-column export of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect(),
        )
    }
}

/// Row storage with a monotonic id counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R: Record> {
    rows: BTreeMap<R::Id, R>,
    columns: Vec<String>,
    last_id: u64,
}

pub type NodeTable = Table<NodeRecord>;
pub type EdgeTable = Table<EdgeRecord>;

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            columns: Vec::new(),
            last_id: 0,
        }
    }
}

/// A borrowed row, resolving column names for expression evaluation.
pub struct RowView<'a, R: Record> {
    record: &'a R,
    columns: &'a [String],
}

impl<R: Record> RowAccess for RowView<'_, R> {
    fn column(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.record.reserved(name) {
            return Some(v);
        }
        if self.columns.iter().any(|c| c == name) {
            return Some(self.record.attrs().get(name).cloned().unwrap_or_default());
        }
        None
    }
}

impl<R: Record> Table<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from persisted parts. Call [`Table::validate`] after.
    #[must_use]
    pub fn from_parts(rows: Vec<R>, columns: Vec<String>, last_id: u64) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.id(), r)).collect(),
            columns,
            last_id,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest id ever assigned (0 for a fresh table).
    #[must_use]
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    #[must_use]
    pub fn contains(&self, id: R::Id) -> bool {
        self.rows.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.rows.get(&id)
    }

    /// Rows in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = R::Id> + '_ {
        self.rows.keys().copied()
    }

    /// User attribute columns, in first-creation order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Reserved columns followed by user columns.
    #[must_use]
    pub fn all_columns(&self) -> Vec<String> {
        R::RESERVED
            .iter()
            .map(|c| (*c).to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        R::is_reserved(name) || self.columns.iter().any(|c| c == name)
    }

    /// Expression view of a row.
    #[must_use]
    pub fn row(&self, id: R::Id) -> Option<RowView<'_, R>> {
        self.rows.get(&id).map(|record| RowView {
            record,
            columns: &self.columns,
        })
    }

    /// Expression views of all rows, in id order.
    pub fn rows(&self) -> impl Iterator<Item = (R::Id, RowView<'_, R>)> {
        self.rows.iter().map(|(id, record)| {
            (
                *id,
                RowView {
                    record,
                    columns: &self.columns,
                },
            )
        })
    }

    /// Cell value; `None` when the row or the column does not exist.
    #[must_use]
    pub fn value(&self, id: R::Id, column: &str) -> Option<Value> {
        self.row(id)?.column(column)
    }

    // -------------------------------------------------------------------------
    // Mutation (crate-private: only graph operations touch tables)
    // -------------------------------------------------------------------------

    /// Register a user column if unknown. Reserved names are accepted as no-ops.
    pub(crate) fn ensure_column(&mut self, name: &str) -> Result<(), GraphError> {
        validate_column_name(name)?;
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
        Ok(())
    }

    /// Insert a new row built from the next id. Advances the counter.
    pub(crate) fn insert(&mut self, build: impl FnOnce(R::Id) -> R) -> R::Id {
        self.last_id += 1;
        let id = R::Id::from(self.last_id);
        let record = build(id);
        let unknown: Vec<String> = record
            .attrs()
            .keys()
            .filter(|k| !self.has_column(k))
            .cloned()
            .collect();
        self.columns.extend(unknown);
        self.rows.insert(id, record);
        id
    }

    pub(crate) fn remove(&mut self, id: R::Id) -> Option<R> {
        self.rows.remove(&id)
    }

    /// Set one cell. Setting `Missing` on a user column clears it.
    pub(crate) fn set(&mut self, id: R::Id, column: &str, value: Value) -> Result<(), GraphError> {
        if IMMUTABLE_COLUMNS.contains(&column) {
            return Err(GraphError::ProtectedColumn(column.to_string()));
        }
        self.ensure_column(column)?;
        let record = self.rows.get_mut(&id).ok_or_else(|| {
            GraphError::Reference(format!("{} id {} does not exist", R::KIND, id))
        })?;
        if R::is_reserved(column) {
            return record.set_reserved(column, value);
        }
        if value.is_missing() {
            record.attrs_mut().remove(column);
        } else {
            record.attrs_mut().insert(column.to_string(), value);
        }
        Ok(())
    }

    pub(crate) fn drop_column(&mut self, name: &str) -> Result<(), GraphError> {
        if R::is_reserved(name) {
            return Err(GraphError::ProtectedColumn(name.to_string()));
        }
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| GraphError::Reference(format!("{} column `{}` does not exist", R::KIND, name)))?;
        self.columns.remove(idx);
        for record in self.rows.values_mut() {
            record.attrs_mut().remove(name);
        }
        Ok(())
    }

    pub(crate) fn rename_column(&mut self, old: &str, new: &str) -> Result<(), GraphError> {
        if old == new {
            return Err(GraphError::Argument(format!(
                "cannot rename `{}` to itself",
                old
            )));
        }
        for name in [old, new] {
            if R::is_reserved(name) {
                return Err(GraphError::ProtectedColumn(name.to_string()));
            }
        }
        validate_column_name(new)?;
        let idx = self
            .columns
            .iter()
            .position(|c| c == old)
            .ok_or_else(|| GraphError::Reference(format!("{} column `{}` does not exist", R::KIND, old)))?;
        if self.has_column(new) {
            return Err(GraphError::Argument(format!(
                "{} column `{}` already exists",
                R::KIND,
                new
            )));
        }
        self.columns[idx] = new.to_string();
        for record in self.rows.values_mut() {
            if let Some(v) = record.attrs_mut().remove(old) {
                record.attrs_mut().insert(new.to_string(), v);
            }
        }
        Ok(())
    }

    /// Copy every value of `source` into `target`, overwriting it.
    pub(crate) fn copy_column(&mut self, source: &str, target: &str) -> Result<(), GraphError> {
        if !self.has_column(source) {
            return Err(GraphError::Reference(format!(
                "{} column `{}` does not exist",
                R::KIND,
                source
            )));
        }
        let ids: Vec<R::Id> = self.rows.keys().copied().collect();
        let values: Vec<Value> = ids
            .iter()
            .map(|id| self.value(*id, source).unwrap_or_default())
            .collect();
        self.write_column(target, ids.into_iter().zip(values))
    }

    /// Left join by id: every row gets `values[id]`, or `Missing` when absent.
    pub(crate) fn join_column(
        &mut self,
        target: &str,
        values: &BTreeMap<R::Id, Value>,
    ) -> Result<(), GraphError> {
        let cells: Vec<(R::Id, Value)> = self
            .rows
            .keys()
            .map(|id| (*id, values.get(id).cloned().unwrap_or_default()))
            .collect();
        self.write_column(target, cells)
    }

    fn write_column(
        &mut self,
        target: &str,
        cells: impl IntoIterator<Item = (R::Id, Value)>,
    ) -> Result<(), GraphError> {
        if IMMUTABLE_COLUMNS.contains(&target) {
            return Err(GraphError::ProtectedColumn(target.to_string()));
        }
        self.ensure_column(target)?;
        for (id, value) in cells {
            self.set(id, target, value)?;
        }
        Ok(())
    }

    /// Ordered-column export.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let columns = self.all_columns();
        let rows = self
            .rows()
            .map(|(_, row)| {
                columns
                    .iter()
                    .map(|c| row.column(c).unwrap_or_default())
                    .collect()
            })
            .collect();
        TableSnapshot { columns, rows }
    }

    /// Internal consistency check.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (key, record) in &self.rows {
            if record.id() != *key {
                return Err(GraphError::Validation(format!(
                    "{} row keyed {} carries id {}",
                    R::KIND,
                    key,
                    record.id()
                )));
            }
            if R::Id::from(self.last_id) < *key {
                return Err(GraphError::Validation(format!(
                    "{} id {} exceeds counter {}",
                    R::KIND,
                    key,
                    self.last_id
                )));
            }
            if let Some(stray) = record.attrs().keys().find(|k| !self.columns.contains(k)) {
                return Err(GraphError::Validation(format!(
                    "{} {} has unregistered column `{}`",
                    R::KIND,
                    key,
                    stray
                )));
            }
        }
        for (i, column) in self.columns.iter().enumerate() {
            if R::is_reserved(column) || self.columns[..i].contains(column) {
                return Err(GraphError::Validation(format!(
                    "{} column `{}` is duplicated",
                    R::KIND,
                    column
                )));
            }
        }
        Ok(())
    }
}

impl NodeTable {
    /// Resolve a node reference to an existing id.
    pub fn resolve(&self, node: &NodeRef) -> Result<NodeId, GraphError> {
        match node {
            NodeRef::Id(id) if self.contains(*id) => Ok(*id),
            NodeRef::Id(id) => Err(GraphError::Reference(format!(
                "node id {} does not exist",
                id
            ))),
            NodeRef::Label(label) => {
                let mut hits = self
                    .iter()
                    .filter(|n| n.label.as_deref() == Some(label.as_str()))
                    .map(|n| n.id);
                match (hits.next(), hits.next()) {
                    (Some(id), None) => Ok(id),
                    (None, _) => Err(GraphError::Reference(format!(
                        "no node labelled '{}'",
                        label
                    ))),
                    (Some(_), Some(_)) => Err(GraphError::Reference(format!(
                        "label '{}' matches more than one node",
                        label
                    ))),
                }
            }
        }
    }
}

impl EdgeTable {
    /// Edges with `node` as either endpoint.
    pub fn incident(&self, node: NodeId) -> impl Iterator<Item = &EdgeRecord> {
        self.iter().filter(move |e| e.from == node || e.to == node)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId) -> NodeRecord {
        NodeRecord {
            id,
            node_type: None,
            label: None,
            attrs: BTreeMap::new(),
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut t = NodeTable::new();
        let a = t.insert(node);
        let b = t.insert(node);
        assert_eq!((a, b), (NodeId(1), NodeId(2)));
        t.remove(b);
        let c = t.insert(node);
        assert_eq!(c, NodeId(3));
        assert_eq!(t.last_id(), 3);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn snapshot_keeps_reserved_columns_first() {
        let mut t = NodeTable::new();
        let id = t.insert(node);
        t.set(id, "weight", Value::Int(4)).expect("set");
        t.set(id, "color", Value::from("red")).expect("set");
        let snap = t.snapshot();
        assert_eq!(snap.columns, vec!["id", "type", "label", "weight", "color"]);
        assert_eq!(snap.column("weight"), Some(vec![Value::Int(4)]));
    }

    #[test]
    fn protected_columns() {
        let mut t = NodeTable::new();
        let id = t.insert(node);
        assert!(matches!(t.drop_column("label"), Err(GraphError::ProtectedColumn(_))));
        assert!(matches!(t.set(id, "id", Value::Int(9)), Err(GraphError::ProtectedColumn(_))));
        t.set(id, "type", Value::from("a")).expect("type is writable");
        assert_eq!(t.value(id, "type"), Some(Value::from("a")));
    }

    #[test]
    fn rename_rules() {
        let mut t = NodeTable::new();
        let id = t.insert(node);
        t.set(id, "a", Value::Int(1)).expect("set");
        t.set(id, "b", Value::Int(2)).expect("set");
        assert!(matches!(t.rename_column("a", "a"), Err(GraphError::Argument(_))));
        assert!(matches!(t.rename_column("a", "b"), Err(GraphError::Argument(_))));
        assert!(matches!(t.rename_column("a", "label"), Err(GraphError::ProtectedColumn(_))));
        assert!(matches!(t.rename_column("zzz", "c"), Err(GraphError::Reference(_))));
        t.rename_column("a", "c").expect("rename");
        assert_eq!(t.columns(), ["c".to_string(), "b".to_string()]);
        assert_eq!(t.value(id, "c"), Some(Value::Int(1)));
    }

    #[test]
    fn join_fills_unmatched_with_missing() {
        let mut t = NodeTable::new();
        let a = t.insert(node);
        let b = t.insert(node);
        let values = BTreeMap::from([(a, Value::Int(10))]);
        t.join_column("score", &values).expect("join");
        assert_eq!(t.value(a, "score"), Some(Value::Int(10)));
        assert_eq!(t.value(b, "score"), Some(Value::Missing));
    }

    #[test]
    fn label_resolution() {
        let mut t = NodeTable::new();
        let a = t.insert(node);
        t.set(a, "label", Value::from("x")).expect("set");
        assert_eq!(t.resolve(&NodeRef::from("x")).expect("resolve"), a);
        assert!(t.resolve(&NodeRef::from("y")).is_err());
        let b = t.insert(node);
        t.set(b, "label", Value::from("x")).expect("set");
        assert!(t.resolve(&NodeRef::from("x")).is_err());
    }

    #[test]
    fn validate_catches_counter_below_ids() {
        let t = NodeTable::from_parts(vec![node(NodeId(5))], Vec::new(), 2);
        assert!(matches!(t.validate(), Err(GraphError::Validation(_))));
    }
}
