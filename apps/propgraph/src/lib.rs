//! # propgraph
//!
//! Library half of the propgraph binary: CLI definitions, pipeline file
//! loading and graph file helpers.

pub mod cli;
