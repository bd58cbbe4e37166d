//! # Action Log
//!
//! Versioned history of every public mutating operation applied to a graph.
//!
//! The log only changes through truncate-then-append: a composite operation
//! truncates whatever its internal sub-operations wrote back to the version
//! it started at, then appends its own single entry. Version ids are
//! therefore always exactly `1..=N`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub version_id: u64,
    pub function_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    pub node_count: usize,
    pub edge_count: usize,
    /// Signed change in node count, `None` when unchanged.
    pub node_delta: Option<i64>,
    /// Signed change in edge count, `None` when unchanged.
    pub edge_delta: Option<i64>,
}

/// Append-only (modulo truncation) list of [`LogEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    /// Highest version id, 0 for an empty log.
    #[must_use]
    pub fn last_version(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.version_id)
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded by a given function.
    pub fn entries_for<'a>(&'a self, function_name: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.function_name == function_name)
    }

    /// Drop every entry with a version greater than `version`.
    pub(crate) fn truncate_to(&mut self, version: u64) {
        self.entries.retain(|e| e.version_id <= version);
    }

    /// Append an entry with the next version id; returns that id.
    pub(crate) fn append(
        &mut self,
        function_name: &str,
        duration: Duration,
        node_count: usize,
        edge_count: usize,
        node_delta: i64,
        edge_delta: i64,
    ) -> u64 {
        let version_id = self.last_version() + 1;
        self.entries.push(LogEntry {
            version_id,
            function_name: function_name.to_string(),
            timestamp: Utc::now(),
            duration,
            node_count,
            edge_count,
            node_delta: (node_delta != 0).then_some(node_delta),
            edge_delta: (edge_delta != 0).then_some(edge_delta),
        });
        version_id
    }

    /// Versions must run exactly `1..=N`.
    pub(crate) fn is_contiguous(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.version_id == i as u64 + 1)
    }
}
