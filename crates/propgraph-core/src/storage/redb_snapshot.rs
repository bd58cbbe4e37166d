//! # redb-backed Snapshot Store
//!
//! A disk-backed [`SnapshotHook`] using the redb embedded database.
//!
//! Every committed graph is stored as one row:
//! `version_id (u64) -> graph_to_bytes(graph)`.
//! Each commit is its own ACID write transaction, so a crash never leaves
//! a partially written snapshot behind.
//!
//! Keys carry no run identifier: saving a version that is already stored
//! replaces it. Call [`RedbSnapshotStore::clear`] before recording a new
//! history into a database that holds an older one.

use super::SnapshotHook;
use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::{Graph, GraphError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for snapshots: version id -> encoded graph bytes.
const SNAPSHOTS: TableDefinition<u64, &[u8]> = TableDefinition::new("snapshots");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed snapshot store.
pub struct RedbSnapshotStore {
    db: Database,
}

impl std::fmt::Debug for RedbSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbSnapshotStore").finish_non_exhaustive()
    }
}

impl RedbSnapshotStore {
    /// Open or create a snapshot database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| GraphError::IoError(e.to_string()))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| GraphError::IoError(e.to_string()))?;

        Ok(Self { db })
    }

    /// Write one snapshot under the graph's current log version.
    pub fn save(&self, graph: &Graph) -> Result<u64, GraphError> {
        let version = graph.get_graph_log().last_version();
        let bytes = graph_to_bytes(graph)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        {
            let mut snapshots = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            snapshots
                .insert(version, bytes.as_slice())
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            meta.insert("latest_version", version)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        Ok(version)
    }

    /// Remove every snapshot and the latest-version marker.
    pub fn clear(&self) -> Result<(), GraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        write_txn
            .delete_table(SNAPSHOTS)
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        write_txn
            .delete_table(METADATA)
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Stored versions, ascending.
    pub fn versions(&self) -> Result<Vec<u64>, GraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| GraphError::IoError(e.to_string()))?;

        let mut versions = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| GraphError::IoError(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| GraphError::IoError(e.to_string()))?;
            versions.push(key.value());
        }
        Ok(versions)
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> Result<u64, GraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        table.len().map_err(|e| GraphError::IoError(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, GraphError> {
        Ok(self.len()? == 0)
    }

    /// Decode the snapshot stored under `version`.
    pub fn load(&self, version: u64) -> Result<Option<Graph>, GraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| GraphError::IoError(e.to_string()))?;
        table
            .get(version)
            .map_err(|e| GraphError::IoError(e.to_string()))?
            .map(|data| graph_from_bytes(data.value()))
            .transpose()
    }

    /// Most recently written snapshot.
    pub fn latest(&self) -> Result<Option<Graph>, GraphError> {
        let latest = {
            let read_txn = self
                .db
                .begin_read()
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            let meta = read_txn
                .open_table(METADATA)
                .map_err(|e| GraphError::IoError(e.to_string()))?;
            meta.get("latest_version")
                .map_err(|e| GraphError::IoError(e.to_string()))?
                .map(|v| v.value())
        };
        match latest {
            Some(version) => self.load(version),
            None => Ok(None),
        }
    }
}

impl SnapshotHook for RedbSnapshotStore {
    fn on_commit(&self, graph: &Graph) -> Result<(), GraphError> {
        self.save(graph).map(|_| ())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSpec, NodeSpec};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn commits_are_persisted_by_version() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshots.redb");
        let store = Arc::new(RedbSnapshotStore::open(&path).expect("open"));

        let g = Graph::new()
            .with_snapshot_hook(store.clone())
            .add_n_nodes(3, Some("city"))
            .expect("nodes")
            .add_edge(EdgeSpec::new(1u64, 2u64))
            .expect("edge");

        assert_eq!(store.versions().expect("versions"), vec![2, 3]);
        assert_eq!(store.len().expect("len"), 2);

        let earlier = store.load(2).expect("load").expect("present");
        assert_eq!(earlier.edge_count(), 0);
        let latest = store.latest().expect("latest").expect("present");
        assert_eq!(latest, g.without_snapshot_hook());
    }

    #[test]
    fn reopen_keeps_snapshots() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshots.redb");
        {
            let store = RedbSnapshotStore::open(&path).expect("open");
            let g = Graph::new().add_node(NodeSpec::new()).expect("node");
            store.save(&g).expect("save");
        }
        let store = RedbSnapshotStore::open(&path).expect("reopen");
        assert_eq!(store.versions().expect("versions"), vec![2]);
        assert!(store.load(7).expect("load").is_none());
    }

    #[test]
    fn same_version_is_replaced_until_cleared() {
        let dir = tempdir().expect("tempdir");
        let store = RedbSnapshotStore::open(dir.path().join("s.redb")).expect("open");

        let first = Graph::new().add_n_nodes(1, None).expect("first");
        let second = Graph::new().add_n_nodes(4, None).expect("second");
        store.save(&first).expect("save first");
        store.save(&second).expect("save second");

        assert_eq!(store.versions().expect("versions"), vec![2]);
        let stored = store.load(2).expect("load").expect("present");
        assert_eq!(stored.node_count(), 4);

        store.clear().expect("clear");
        assert!(store.is_empty().expect("is_empty"));
        assert!(store.latest().expect("latest").is_none());
    }

    #[test]
    fn empty_store_has_no_latest() {
        let dir = tempdir().expect("tempdir");
        let store = RedbSnapshotStore::open(dir.path().join("s.redb")).expect("open");
        assert!(store.is_empty().expect("is_empty"));
        assert!(store.latest().expect("latest").is_none());
    }
}
