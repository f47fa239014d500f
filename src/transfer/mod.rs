//! Item transfers and folder runs
//!
//! [`TransferClient`] performs single-object downloads and uploads through the
//! envelope cipher, and drives whole-folder copies through the worker pool.

mod client;

pub use client::*;
