//! # propgraph CLI Module
//!
//! This module implements the CLI interface for propgraph.
//!
//! ## Available Commands
//!
//! - `run` - Run a pipeline file and optionally save the resulting graph
//! - `show` - Print the node or edge table of a saved graph
//! - `log` - Print the action log of a saved graph
//! - `export` - Write a saved graph as JSON
//! - `snapshots` - List the versions stored in a snapshot database
//! - `restore` - Write one stored snapshot to a graph file

mod commands;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use propgraph_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// propgraph - chained property graphs
///
/// Build graphs from declarative pipelines, inspect their tables and
/// action logs, and browse versioned snapshots.
#[derive(Parser, Debug)]
#[command(name = "propgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the snapshot database
    #[arg(short = 'D', long, global = true, default_value = "propgraph.redb")]
    pub database: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which table `show` prints.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableKind {
    #[default]
    Nodes,
    Edges,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline file (TOML or JSON)
    Run {
        /// Path to the pipeline file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Store a snapshot of every committed operation in this database
        /// (snapshots of an earlier run are replaced)
        #[arg(short, long)]
        snapshot_db: Option<PathBuf>,

        /// Save the resulting graph to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a table of a saved graph
    Show {
        /// Graph file
        #[arg(short, long)]
        input: PathBuf,

        /// Table to print
        #[arg(short, long, value_enum, default_value_t = TableKind::Nodes)]
        table: TableKind,
    },

    /// Print the action log of a saved graph
    Log {
        /// Graph file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a saved graph as JSON
    Export {
        /// Graph file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the versions stored in the snapshot database
    Snapshots,

    /// Write one stored snapshot to a graph file
    Restore {
        /// Log version to restore
        #[arg(long)]
        version: u64,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GraphError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Run {
            pipeline,
            snapshot_db,
            output,
        }) => cmd_run(&pipeline, snapshot_db.as_deref(), output.as_deref(), json_mode),
        Some(Commands::Show { input, table }) => cmd_show(&input, table, json_mode),
        Some(Commands::Log { input }) => cmd_log(&input, json_mode),
        Some(Commands::Export { input, output }) => cmd_export(&input, &output),
        Some(Commands::Snapshots) => cmd_snapshots(&cli.database, json_mode),
        Some(Commands::Restore { version, output }) => {
            cmd_restore(&cli.database, version, &output)
        }
        None => {
            // No subcommand - show usage
            Cli::command()
                .print_help()
                .map_err(|e| GraphError::IoError(e.to_string()))
        }
    }
}
