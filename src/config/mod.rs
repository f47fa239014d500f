//! Configuration module for s3csecmd
//!
//! CLI arguments and the runtime settings derived from them.

mod settings;

pub use settings::*;
