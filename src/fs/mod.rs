//! File system helpers
//!
//! Destination checks and path resolution for local trees.

mod operations;

pub use operations::*;
