//! Object storage module
//!
//! Locator parsing, the blocking [`ObjectStore`] interface used by the
//! transfer pipeline, an in-memory store, and the native AWS SDK store.

mod location;
mod memory;
mod store;

#[cfg(feature = "native_s3")]
mod native_s3;

pub use location::*;
pub use memory::*;
pub use store::*;

#[cfg(feature = "native_s3")]
pub use native_s3::{AwsSession, NativeS3Config, NativeS3Store};
