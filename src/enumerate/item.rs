//! Transferable items

use crate::error::Result;
use crate::storage::S3Location;
use std::fmt;
use std::path::PathBuf;

/// One item to transfer, with both endpoints resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    /// Remote object to local file
    Download {
        /// Object to fetch
        source: S3Location,
        /// File to write
        dest: PathBuf,
        /// Path relative to the folder root, `/`-separated
        relative: String,
    },
    /// Local file to remote object
    Upload {
        /// File to read
        source: PathBuf,
        /// Object to write
        dest: S3Location,
        /// Path relative to the folder root, `/`-separated
        relative: String,
    },
}

impl ItemRef {
    /// Path relative to the folder root
    pub fn relative_path(&self) -> &str {
        match self {
            ItemRef::Download { relative, .. } | ItemRef::Upload { relative, .. } => relative,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Download { source, dest, .. } => {
                write!(f, "{} -> {}", source, dest.display())
            }
            ItemRef::Upload { source, dest, .. } => {
                write!(f, "{} -> {}", source.display(), dest)
            }
        }
    }
}

/// A finite, single-pass source of items
pub trait ItemSource {
    /// Call `visit` for each item in traversal order.
    ///
    /// Returns the first error from traversal or from `visit`; no further
    /// pages are fetched and no further directories are read after it.
    fn for_each_item(&mut self, visit: &mut dyn FnMut(ItemRef) -> Result<()>) -> Result<()>;
}
