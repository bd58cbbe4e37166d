//! # Storage Module
//!
//! Snapshot persistence hooks.
//!
//! A [`SnapshotHook`] attached with `Graph::with_snapshot_hook` is called
//! once after every successful outermost operation, never for the nested
//! operations a composite runs internally. Two stores are provided:
//! - [`MemorySnapshotStore`]: keeps encoded snapshots in memory (tests, tooling)
//! - [`RedbSnapshotStore`]: ACID on-disk store keyed by log version

mod redb_snapshot;

pub use redb_snapshot::RedbSnapshotStore;

use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::{Graph, GraphError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Receives every committed graph.
pub trait SnapshotHook: Send + Sync {
    /// Called with the graph produced by a committed operation.
    ///
    /// An error fails the operation that triggered it.
    fn on_commit(&self, graph: &Graph) -> Result<(), GraphError>;
}

/// In-memory snapshot store keyed by log version.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<BTreeMap<u64, Vec<u8>>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored versions, ascending.
    pub fn versions(&self) -> Result<Vec<u64>, GraphError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        Ok(guard.keys().copied().collect())
    }

    /// Decode the snapshot taken at `version`.
    pub fn load(&self, version: u64) -> Result<Option<Graph>, GraphError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        guard.get(&version).map(|b| graph_from_bytes(b)).transpose()
    }
}

impl SnapshotHook for MemorySnapshotStore {
    fn on_commit(&self, graph: &Graph) -> Result<(), GraphError> {
        let bytes = graph_to_bytes(graph)?;
        let version = graph.get_graph_log().last_version();
        self.snapshots
            .lock()
            .map_err(|e| GraphError::IoError(e.to_string()))?
            .insert(version, bytes);
        Ok(())
    }
}
