//! Object store abstraction
//!
//! The transfer pipeline talks to the remote namespace only through
//! [`ObjectStore`]. Implementations are called concurrently from worker
//! threads and from the enumerator thread, so they must be `Send + Sync`
//! and expose blocking methods.

use crate::error::Result;
use crate::storage::S3Location;
use std::collections::HashMap;
use std::io::Read;

/// One key returned by a listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Keys on this page, in key order
    pub entries: Vec<ListEntry>,
    /// More pages remain after this one
    pub is_truncated: bool,
    /// Marker for the next request, when the store provides one
    pub next_marker: Option<String>,
}

/// Object metadata returned by a HEAD request
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    /// Stored size in bytes
    pub size: u64,
    /// User metadata
    pub metadata: HashMap<String, String>,
}

impl ObjectHead {
    /// Look up a metadata value, ignoring header-name case
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Streamed object body
pub type ObjectBody = Box<dyn Read + Send>;

/// Blocking access to an S3-compatible object store
pub trait ObjectStore: Send + Sync {
    /// List keys under `prefix` that sort after `marker`
    fn list_page(&self, bucket: &str, prefix: &str, marker: Option<&str>) -> Result<ListPage>;

    /// Fetch object metadata. A missing key is reported with
    /// [`CseError::is_not_found`](crate::error::CseError::is_not_found) set.
    fn head_object(&self, location: &S3Location) -> Result<ObjectHead>;

    /// Open the object body for streaming
    fn get_object(&self, location: &S3Location) -> Result<ObjectBody>;

    /// Store `body` under `location` with the given user metadata.
    /// Returns the number of bytes stored.
    fn put_object(
        &self,
        location: &S3Location,
        body: &mut dyn Read,
        metadata: &HashMap<String, String>,
    ) -> Result<u64>;
}
