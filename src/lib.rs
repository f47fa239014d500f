//! # s3csecmd - Encrypted bulk copy to and from S3
//!
//! s3csecmd copies directory trees between a local filesystem and an S3
//! prefix. Every object body is encrypted on the client with a fresh data key
//! before upload; downloads decrypt objects that carry envelope metadata and
//! copy anything else as stored.
//!
//! ## Pipeline
//!
//! A copy run is three cooperating parts:
//!
//! - an **enumerator** that lists the remote prefix page by page, or walks the
//!   local tree, and submits one task per item;
//! - a **worker pool** of fixed capacity that executes those tasks, applying
//!   backpressure to the enumerator when all workers are busy;
//! - a **monitor** that drains task outcomes, stops the pool on the first
//!   failure and reports the run's single terminal result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use s3csecmd::config::TransferConfig;
//! use s3csecmd::crypto::{EnvelopeCipher, LocalKeyWrapper};
//! use s3csecmd::storage::{MemoryStore, S3Location};
//! use s3csecmd::transfer::TransferClient;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let cipher = EnvelopeCipher::new(Arc::new(LocalKeyWrapper::generate("local")));
//! let client = TransferClient::new(store, cipher, TransferConfig::from_env());
//!
//! let dest = S3Location::parse("s3://bucket/backup").unwrap();
//! let summary = client.upload_folder(Path::new("/data"), &dest).unwrap();
//! summary.print_summary();
//! ```
//!
//! ## Driving the pool directly
//!
//! ```no_run
//! use s3csecmd::core::run_pipeline;
//!
//! let summary = run_pipeline(4, None, |pool| {
//!     for i in 0..100 {
//!         pool.submit_fn(format!("job-{}", i), || Ok(()))?;
//!     }
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(summary.tasks_completed, 100);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod crypto;
pub mod enumerate;
pub mod error;
pub mod fs;
pub mod progress;
pub mod storage;
pub mod transfer;

// Re-export commonly used types
pub use crate::config::TransferConfig;
pub use crate::core::{run_pipeline, RunSummary, WorkerPool};
pub use crate::error::{CseError, Result};
pub use crate::progress::ProgressReporter;
pub use crate::transfer::TransferClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use s3csecmd::prelude::*;
    //! ```

    pub use crate::config::TransferConfig;
    pub use crate::core::{run_pipeline, Job, Monitor, RunSummary, Task, TaskOutcome, WorkerPool};
    pub use crate::crypto::{EnvelopeCipher, KeyWrapper, LocalKeyWrapper};
    pub use crate::enumerate::{submit_all, ItemRef, ItemSource, LocalTree, RemoteListing};
    pub use crate::error::{CseError, Result};
    pub use crate::progress::ProgressReporter;
    pub use crate::storage::{is_remote_locator, MemoryStore, ObjectStore, S3Location};
    pub use crate::transfer::TransferClient;
}
