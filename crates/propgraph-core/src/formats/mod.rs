//! # Formats Module
//!
//! Binary persistence of whole graphs.
//!
//! File I/O is done by the caller (the app layer or a snapshot store);
//! this module only turns a `Graph` into bytes and back.

mod persistence;

pub use persistence::*;
