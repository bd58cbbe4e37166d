//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::TableKind;
use propgraph_core::{
    Graph, GraphError, Pipeline, RedbSnapshotStore, SerializableGraph, TableSnapshot, Value,
    formats::MAX_PERSISTENCE_PAYLOAD_SIZE, graph_from_bytes, graph_to_bytes,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for pipeline files (10 MB).
const MAX_PIPELINE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum file size for graph files.
const MAX_GRAPH_FILE_SIZE: u64 = MAX_PERSISTENCE_PAYLOAD_SIZE as u64;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GraphError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path: canonical, existing, and a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, GraphError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GraphError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(GraphError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| GraphError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// PIPELINE FILES
// =============================================================================

/// Syntax of a pipeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFormat {
    Toml,
    Json,
}

impl PipelineFormat {
    /// `.json` files are JSON; everything else is read as TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Parse pipeline text.
pub fn parse_pipeline(text: &str, format: PipelineFormat) -> Result<Pipeline, GraphError> {
    match format {
        PipelineFormat::Toml => toml::from_str(text)
            .map_err(|e| GraphError::SerializationError(format!("Invalid pipeline: {}", e))),
        PipelineFormat::Json => serde_json::from_str(text)
            .map_err(|e| GraphError::SerializationError(format!("Invalid pipeline: {}", e))),
    }
}

/// Read and parse a pipeline file.
pub fn load_pipeline(path: &Path) -> Result<Pipeline, GraphError> {
    let validated_path = validate_file_path(path)?;
    validate_file_size(&validated_path, MAX_PIPELINE_FILE_SIZE)?;

    let text = std::fs::read_to_string(&validated_path)
        .map_err(|e| GraphError::IoError(format!("Read file: {}", e)))?;
    parse_pipeline(&text, PipelineFormat::from_path(&validated_path))
}

// =============================================================================
// GRAPH FILES
// =============================================================================

/// Read a graph saved in the binary format.
pub fn read_graph(path: &Path) -> Result<Graph, GraphError> {
    let validated_path = validate_file_path(path)?;
    validate_file_size(&validated_path, MAX_GRAPH_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| GraphError::IoError(format!("Read file: {}", e)))?;
    graph_from_bytes(&data)
}

/// Save a graph in the binary format. Returns the number of bytes written.
pub fn write_graph(graph: &Graph, path: &Path) -> Result<usize, GraphError> {
    let validated_output = validate_output_path(path)?;
    let data = graph_to_bytes(graph)?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| GraphError::IoError(format!("Write file: {}", e)))?;
    Ok(data.len())
}

// =============================================================================
// JSON RENDERING
// =============================================================================

/// A cell as JSON; `Missing` and NaN become `null`.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Missing => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
    }
}

/// A table as a list of row objects, keys in column order.
#[must_use]
pub fn table_to_json(table: &TableSnapshot) -> serde_json::Value {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = table
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value_to_json(value)))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

fn print_json(output: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(output).unwrap_or_default()
    );
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run a pipeline file.
pub fn cmd_run(
    pipeline_path: &Path,
    snapshot_db: Option<&Path>,
    output: Option<&Path>,
    json_mode: bool,
) -> Result<(), GraphError> {
    let pipeline = load_pipeline(pipeline_path)?;

    let mut graph = pipeline.start();
    if let Some(db) = snapshot_db {
        let store = RedbSnapshotStore::open(db)?;
        // Versions restart at 2 on every run; drop the previous history.
        if !store.is_empty()? {
            tracing::info!(db = %db.display(), "replacing snapshots of a previous run");
            store.clear()?;
        }
        graph = graph.with_snapshot_hook(Arc::new(store));
    }

    tracing::info!(
        pipeline = %pipeline_path.display(),
        steps = pipeline.steps.len(),
        "running pipeline"
    );
    let graph = pipeline.run_on(graph)?.without_snapshot_hook();

    let written = match output {
        Some(path) => Some(write_graph(&graph, path)?),
        None => None,
    };

    if json_mode {
        let output = serde_json::json!({
            "steps": pipeline.steps.len(),
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "last_version": graph.get_graph_log().last_version(),
            "selection_size": graph.get_selection().len(),
            "bytes_written": written,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Pipeline complete");
    println!("=================");
    println!("Steps:        {}", pipeline.steps.len());
    println!("Nodes:        {}", graph.node_count());
    println!("Edges:        {}", graph.edge_count());
    println!("Log version:  {}", graph.get_graph_log().last_version());
    println!("Selection:    {}", graph.get_selection().len());
    if let (Some(path), Some(bytes)) = (output, written) {
        println!("Saved {} bytes to {:?}", bytes, path);
    }

    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Print the node or edge table of a saved graph.
pub fn cmd_show(input: &Path, table: TableKind, json_mode: bool) -> Result<(), GraphError> {
    let graph = read_graph(input)?;
    let snapshot = match table {
        TableKind::Nodes => graph.get_node_table(),
        TableKind::Edges => graph.get_edge_table(),
    };

    if json_mode {
        print_json(&table_to_json(&snapshot));
        return Ok(());
    }

    println!("{}", snapshot.columns.join("\t"));
    for row in &snapshot.rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }

    Ok(())
}

// =============================================================================
// LOG COMMAND
// =============================================================================

/// Print the action log of a saved graph.
pub fn cmd_log(input: &Path, json_mode: bool) -> Result<(), GraphError> {
    let graph = read_graph(input)?;
    let entries = graph.get_graph_log().entries();

    if json_mode {
        let output: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "version_id": e.version_id,
                    "function_name": e.function_name,
                    "timestamp": e.timestamp.to_rfc3339(),
                    "duration_micros": e.duration.as_micros() as u64,
                    "node_count": e.node_count,
                    "edge_count": e.edge_count,
                    "node_delta": e.node_delta,
                    "edge_delta": e.edge_delta,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(output));
        return Ok(());
    }

    println!("version\tfunction\tnodes\tedges\ttimestamp");
    for e in entries {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            e.version_id,
            e.function_name,
            e.node_count,
            e.edge_count,
            e.timestamp.to_rfc3339()
        );
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write a saved graph as JSON.
pub fn cmd_export(input: &Path, output: &Path) -> Result<(), GraphError> {
    let graph = read_graph(input)?;
    let validated_output = validate_output_path(output)?;

    let serializable = SerializableGraph::from(&graph);
    let data = serde_json::to_vec_pretty(&serializable)
        .map_err(|e| GraphError::SerializationError(e.to_string()))?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| GraphError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// SNAPSHOT COMMANDS
// =============================================================================

/// List the versions stored in a snapshot database.
pub fn cmd_snapshots(db_path: &Path, json_mode: bool) -> Result<(), GraphError> {
    let store = RedbSnapshotStore::open(db_path)?;
    let versions = store.versions()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "versions": versions,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Snapshots in {:?}: {}", db_path, versions.len());
    for version in versions {
        println!("  {}", version);
    }

    Ok(())
}

/// Write one stored snapshot to a graph file.
pub fn cmd_restore(db_path: &Path, version: u64, output: &Path) -> Result<(), GraphError> {
    let store = RedbSnapshotStore::open(db_path)?;
    let graph = store.load(version)?.ok_or_else(|| {
        GraphError::Reference(format!("no snapshot stored for version {}", version))
    })?;

    let bytes = write_graph(&graph, output)?;
    tracing::info!(version, bytes, "restored snapshot");
    println!(
        "Restored version {} ({} nodes, {} edges) to {:?}",
        version,
        graph.node_count(),
        graph.edge_count(),
        output
    );

    Ok(())
}
