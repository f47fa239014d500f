//! Paginated remote listing

use crate::enumerate::{ItemRef, ItemSource};
use crate::error::{CseError, Result};
use crate::storage::{ObjectStore, S3Location};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Key suffix of encryption instruction files stored beside objects
pub const INSTRUCTION_SUFFIX: &str = ".instruction";

/// Whether a listed key is transferable content
pub fn is_transferable_key(key: &str) -> bool {
    !key.ends_with('/') && !key.ends_with(INSTRUCTION_SUFFIX)
}

/// Download items under a remote folder, one listing page at a time
pub struct RemoteListing {
    store: Arc<dyn ObjectStore>,
    folder: S3Location,
    dest_root: PathBuf,
    marker: Option<String>,
}

impl RemoteListing {
    /// List `folder` and mirror it under `dest_root`
    pub fn new(store: Arc<dyn ObjectStore>, folder: S3Location, dest_root: impl AsRef<Path>) -> Self {
        Self {
            store,
            folder,
            dest_root: dest_root.as_ref().to_path_buf(),
            marker: None,
        }
    }

    fn item_for(&self, key: &str, prefix: &str) -> Result<ItemRef> {
        let relative = key
            .strip_prefix(prefix)
            .unwrap_or(key)
            .trim_matches('/')
            .to_string();

        let mut dest = self.dest_root.clone();
        for part in relative.split('/').filter(|part| !part.is_empty()) {
            // `..` or `.` would resolve outside (or onto) the destination folder
            if part == ".." || part == "." {
                return Err(CseError::InvalidLocation(format!(
                    "s3://{}/{}: key does not map to a path under {}",
                    self.folder.bucket,
                    key,
                    self.dest_root.display()
                )));
            }
            dest.push(part);
        }

        Ok(ItemRef::Download {
            source: S3Location {
                bucket: self.folder.bucket.clone(),
                key: key.to_string(),
            },
            dest,
            relative,
        })
    }
}

impl ItemSource for RemoteListing {
    fn for_each_item(&mut self, visit: &mut dyn FnMut(ItemRef) -> Result<()>) -> Result<()> {
        let prefix = self.folder.folder_prefix();

        loop {
            let page = self
                .store
                .list_page(&self.folder.bucket, &prefix, self.marker.as_deref())?;
            trace!(
                "Listed {} keys after {:?} (truncated: {})",
                page.entries.len(),
                self.marker,
                page.is_truncated
            );

            let mut last_key = None;
            for entry in page.entries {
                if is_transferable_key(&entry.key) {
                    visit(self.item_for(&entry.key, &prefix)?)?;
                }
                last_key = Some(entry.key);
            }

            if !page.is_truncated {
                return Ok(());
            }

            let next = page.next_marker.or(last_key);
            if next.is_none() || next == self.marker {
                return Err(CseError::transport(
                    "ListObjects",
                    format!("listing of {} did not advance past {:?}", self.folder, self.marker),
                ));
            }
            self.marker = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn collect(listing: &mut RemoteListing) -> Vec<ItemRef> {
        let mut items = Vec::new();
        listing
            .for_each_item(&mut |item| {
                items.push(item);
                Ok(())
            })
            .unwrap();
        items
    }

    #[test]
    fn test_transferable_key() {
        assert!(is_transferable_key("a/b.txt"));
        assert!(!is_transferable_key("a/"));
        assert!(!is_transferable_key("a/b.txt.instruction"));
    }

    #[test]
    fn test_paging_and_destinations() {
        let store = Arc::new(MemoryStore::new().with_page_size(2));
        let folder = S3Location::new("bkt", "data");
        for key in ["data/a", "data/sub/", "data/sub/b", "data/c.instruction", "other/x"] {
            let location = S3Location {
                bucket: "bkt".to_string(),
                key: key.to_string(),
            };
            store.insert(&location, b"x".to_vec());
        }

        let mut listing = RemoteListing::new(store.clone(), folder, "/restore");
        let items = collect(&mut listing);

        let relatives: Vec<&str> = items.iter().map(|i| i.relative_path()).collect();
        assert_eq!(relatives, vec!["a", "sub/b"]);
        assert_eq!(
            items[1],
            ItemRef::Download {
                source: S3Location::new("bkt", "data/sub/b"),
                dest: PathBuf::from("/restore/sub/b"),
                relative: "sub/b".to_string(),
            }
        );
        assert_eq!(store.markers_requested().len(), 2);
    }

    #[test]
    fn test_folder_prefix_not_matched_by_sibling() {
        let store = Arc::new(MemoryStore::new());
        let folder = S3Location::new("bkt", "data");
        store.insert(&folder.with_key("data/a"), b"x".to_vec());
        store.insert(&folder.with_key("database/b"), b"x".to_vec());

        let mut listing = RemoteListing::new(store, folder, "/restore");
        assert_eq!(collect(&mut listing).len(), 1);
    }

    #[test]
    fn test_visitor_error_stops_listing() {
        let store = Arc::new(MemoryStore::new().with_page_size(1));
        let folder = S3Location::new("bkt", "");
        for key in ["a", "b", "c"] {
            store.insert(&folder.with_key(key), b"x".to_vec());
        }

        let mut listing = RemoteListing::new(store.clone(), folder, "/restore");
        let err = listing
            .for_each_item(&mut |_| Err(CseError::PoolStopped))
            .unwrap_err();

        assert!(err.is_pool_stopped());
        assert_eq!(store.markers_requested(), vec![None]);
    }

    #[test]
    fn test_dot_segments_rejected() {
        let listing = RemoteListing::new(
            Arc::new(MemoryStore::new()),
            S3Location::new("bkt", "data"),
            "/restore",
        );

        for key in ["data/../../escaped.txt", "data/sub/../../x", "data/./a"] {
            let err = listing.item_for(key, "data/").unwrap_err();
            assert!(matches!(err, CseError::InvalidLocation(_)), "{}", key);
        }
        assert!(listing.item_for("data/..hidden/a..b", "data/").is_ok());
    }

    #[test]
    fn test_escaping_key_stops_listing() {
        let store = Arc::new(MemoryStore::new());
        let folder = S3Location::new("bkt", "data");
        store.insert(&folder.with_key("data/../../escaped.txt"), b"x".to_vec());
        store.insert(&folder.with_key("data/z"), b"x".to_vec());

        let mut listing = RemoteListing::new(store, folder, "/restore");
        let mut seen = Vec::new();
        let err = listing
            .for_each_item(&mut |item| {
                seen.push(item);
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, CseError::InvalidLocation(_)));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_listing_failure_propagates() {
        let store = Arc::new(MemoryStore::new().with_page_size(1));
        let folder = S3Location::new("bkt", "");
        for key in ["a", "b"] {
            store.insert(&folder.with_key(key), b"x".to_vec());
        }
        store.fail_listing_at("a");

        let mut listing = RemoteListing::new(store, folder, "/restore");
        let mut seen = 0;
        let err = listing
            .for_each_item(&mut |_| {
                seen += 1;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, CseError::Transport { .. }));
        assert_eq!(seen, 1);
    }
}
