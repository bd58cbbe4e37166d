//! # propgraph - Chained Property Graphs
//!
//! The command-line binary for the propgraph engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │            apps/propgraph (THE BINARY)            │
//! │                                                   │
//! │  ┌──────────────┐         ┌───────────────────┐   │
//! │  │  CLI (clap)  │ ──────▶ │ pipeline files    │   │
//! │  └──────┬───────┘         │ (TOML / JSON)     │   │
//! │         │                 └─────────┬─────────┘   │
//! │         ▼                           ▼             │
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │        propgraph-core (THE LOGIC)           │  │
//! │  │   tables · selection · log · actions        │  │
//! │  └──────────────────────┬──────────────────────┘  │
//! │                         ▼                         │
//! │                ┌─────────────────┐                │
//! │                │ redb snapshots  │                │
//! │                └─────────────────┘                │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! propgraph run -p pipeline.toml --snapshot-db runs.redb -o graph.pgrf
//! propgraph show -i graph.pgrf --table edges
//! propgraph log -i graph.pgrf --json-mode
//! propgraph export -i graph.pgrf -o graph.json
//! propgraph snapshots -D runs.redb
//! propgraph restore -D runs.redb --version 3 -o v3.pgrf
//! ```

use clap::Parser;
use propgraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing. PROPGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PROPGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "propgraph=debug,propgraph_core=debug"
    } else {
        "propgraph=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the propgraph startup banner.
fn print_banner() {
    println!(
        r#"
  propgraph v{}
  chained property graphs · versioned · replayable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
