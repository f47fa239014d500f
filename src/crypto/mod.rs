//! Client-side envelope encryption
//!
//! Every uploaded object gets a fresh data key. The body is sealed with
//! chunked AES-256-GCM and the wrapped data key travels in the object's
//! metadata, so downloads can recover it through the same key wrapper.

mod envelope;
mod keys;

#[cfg(feature = "native_s3")]
mod kms;

pub use envelope::*;
pub use keys::*;

#[cfg(feature = "native_s3")]
pub use kms::KmsKeyWrapper;
