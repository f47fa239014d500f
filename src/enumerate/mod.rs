//! Source enumeration
//!
//! Walks a remote listing or a local directory tree and feeds one pool task
//! per transferable item.

mod item;
mod local;
mod remote;

pub use item::*;
pub use local::*;
pub use remote::*;

use crate::core::{Job, WorkerPool};
use crate::error::Result;
use tracing::debug;

/// Submit one task per item produced by `source`.
///
/// Stops at the first error, including a rejected submission once the pool
/// has been stopped, and returns it as the producer's terminal error.
pub fn submit_all<S, F>(source: &mut S, pool: &WorkerPool, mut make_job: F) -> Result<u64>
where
    S: ItemSource + ?Sized,
    F: FnMut(ItemRef) -> Box<dyn Job>,
{
    let mut submitted = 0u64;
    source.for_each_item(&mut |item| {
        let label = item.relative_path().to_string();
        pool.submit_boxed(label, make_job(item))?;
        submitted += 1;
        Ok(())
    })?;

    debug!("Enumeration finished after {} items", submitted);
    Ok(submitted)
}
