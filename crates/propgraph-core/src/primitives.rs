//! # Primitives
//!
//! Hardcoded constants for the propgraph CORE: the reserved column sets of
//! the node and edge tables, the binary format header, and input limits.

/// Leading, reserved columns of the node table, in snapshot order.
pub const NODE_RESERVED_COLUMNS: [&str; 3] = ["id", "type", "label"];

/// Leading, reserved columns of the edge table, in snapshot order.
pub const EDGE_RESERVED_COLUMNS: [&str; 4] = ["id", "from", "to", "rel"];

/// Columns no expression, copy alias or attribute setter may target.
///
/// `type`, `label` and `rel` are reserved but writable; these three are not.
pub const IMMUTABLE_COLUMNS: [&str; 3] = ["id", "from", "to"];

/// Magic bytes for the propgraph binary format header.
///
/// - File Header = Magic Bytes ("PGRF") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"PGRF";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Function name recorded as log entry 1 of every graph.
pub const CREATE_GRAPH_FN: &str = "create_graph";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a column name.
pub const MAX_COLUMN_NAME_LENGTH: usize = 256;

/// Maximum number of nodes created by a single `add_n_nodes` call.
pub const MAX_BATCH_NODES: usize = 1_000_000;

/// Maximum length of an expression source string.
pub const MAX_EXPRESSION_LENGTH: usize = 16 * 1024;

/// Check that a user-supplied column name is usable.
pub fn validate_column_name(name: &str) -> Result<(), crate::GraphError> {
    if name.is_empty() {
        return Err(crate::GraphError::Argument(
            "column name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_COLUMN_NAME_LENGTH {
        return Err(crate::GraphError::Argument(format!(
            "column name exceeds {} bytes",
            MAX_COLUMN_NAME_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"PGRF");
    }

    #[test]
    fn immutable_columns_are_reserved() {
        for col in IMMUTABLE_COLUMNS {
            assert!(NODE_RESERVED_COLUMNS.contains(&col) || EDGE_RESERVED_COLUMNS.contains(&col));
        }
    }

    #[test]
    fn empty_column_name_rejected() {
        assert!(validate_column_name("").is_err());
        assert!(validate_column_name("weight").is_ok());
    }
}
