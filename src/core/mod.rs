//! Core pipeline module
//!
//! Provides the bounded worker pool, the task abstraction it executes, and
//! the monitor that turns a stream of task outcomes into one run result.

mod monitor;
mod pool;
mod task;

pub use monitor::*;
pub use pool::*;
pub use task::*;
