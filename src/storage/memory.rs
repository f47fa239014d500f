//! In-process object store
//!
//! Follows S3 `ListObjects` semantics (lexicographic key order, marker is
//! exclusive, `next_marker` only when asked for) and supports failure
//! injection so pipeline behaviour can be exercised without a network.

use crate::error::{CseError, Result};
use crate::storage::{ListEntry, ListPage, ObjectBody, ObjectHead, ObjectStore, S3Location};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::{Mutex, PoisonError, RwLock};

/// Default page size, as in S3
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    metadata: HashMap<String, String>,
}

/// Thread-safe in-memory object store
#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
    page_size: usize,
    emit_next_marker: bool,
    failing_keys: RwLock<HashSet<String>>,
    failing_listing: RwLock<Option<String>>,
    markers: Mutex<Vec<Option<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            emit_next_marker: false,
            failing_keys: RwLock::new(HashSet::new()),
            failing_listing: RwLock::new(None),
            markers: Mutex::new(Vec::new()),
        }
    }

    /// Limit the number of keys per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Include `next_marker` in truncated pages
    pub fn with_next_marker(mut self, emit: bool) -> Self {
        self.emit_next_marker = emit;
        self
    }

    /// Store an object directly
    pub fn insert(&self, location: &S3Location, data: impl Into<Vec<u8>>) {
        self.insert_with_metadata(location, data, HashMap::new());
    }

    /// Store an object with user metadata
    pub fn insert_with_metadata(
        &self,
        location: &S3Location,
        data: impl Into<Vec<u8>>,
        metadata: HashMap<String, String>,
    ) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (location.bucket.clone(), location.key.clone()),
                StoredObject {
                    data: data.into(),
                    metadata,
                },
            );
    }

    /// Raw stored bytes of an object
    pub fn object_data(&self, location: &S3Location) -> Option<Vec<u8>> {
        self.lookup(location).map(|o| o.data)
    }

    /// User metadata of an object
    pub fn object_metadata(&self, location: &S3Location) -> Option<HashMap<String, String>> {
        self.lookup(location).map(|o| o.metadata)
    }

    /// Keys stored in `bucket`
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Make every request touching `key` fail
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    /// Make listing requests fail once `marker` is requested
    pub fn fail_listing_at(&self, marker: impl Into<String>) {
        *self
            .failing_listing
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(marker.into());
    }

    /// Markers passed to `list_page`, in request order
    pub fn markers_requested(&self) -> Vec<Option<String>> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, location: &S3Location) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(location.bucket.clone(), location.key.clone()))
            .cloned()
    }

    fn check_key(&self, operation: &'static str, key: &str) -> Result<()> {
        let failing = self
            .failing_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if failing.contains(key) {
            return Err(CseError::transport(operation, format!("injected failure for {}", key)));
        }
        Ok(())
    }

    fn fetch(&self, operation: &'static str, location: &S3Location) -> Result<StoredObject> {
        self.check_key(operation, &location.key)?;
        self.lookup(location).ok_or_else(|| {
            CseError::not_found(operation, format!("NoSuchKey: {}", location))
        })
    }
}

impl ObjectStore for MemoryStore {
    fn list_page(&self, bucket: &str, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(marker.map(str::to_string));

        if let Some(failing) = self
            .failing_listing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
        {
            if marker == Some(failing) {
                return Err(CseError::transport("ListObjects", "injected listing failure"));
            }
        }

        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching = objects
            .iter()
            .filter(|((b, k), _)| {
                b == bucket && k.starts_with(prefix) && marker.map_or(true, |m| k.as_str() > m)
            })
            .map(|((_, k), o)| ListEntry {
                key: k.clone(),
                size: o.data.len() as u64,
            });

        let entries: Vec<ListEntry> = matching.by_ref().take(self.page_size).collect();
        let is_truncated = matching.next().is_some();
        let next_marker = if is_truncated && self.emit_next_marker {
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            is_truncated,
            next_marker,
        })
    }

    fn head_object(&self, location: &S3Location) -> Result<ObjectHead> {
        let object = self.fetch("HeadObject", location)?;
        Ok(ObjectHead {
            size: object.data.len() as u64,
            metadata: object.metadata,
        })
    }

    fn get_object(&self, location: &S3Location) -> Result<ObjectBody> {
        let object = self.fetch("GetObject", location)?;
        Ok(Box::new(Cursor::new(object.data)))
    }

    fn put_object(
        &self,
        location: &S3Location,
        body: &mut dyn Read,
        metadata: &HashMap<String, String>,
    ) -> Result<u64> {
        self.check_key("PutObject", &location.key)?;

        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .map_err(|e| CseError::transport("PutObject", e.to_string()))?;
        let len = data.len() as u64;

        self.insert_with_metadata(location, data, metadata.clone());
        Ok(len)
    }
}
