//! Local directory traversal

use crate::enumerate::{ItemRef, ItemSource};
use crate::error::{CseError, Result};
use crate::fs::real_path;
use crate::storage::S3Location;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Upload items for every file under a local directory
pub struct LocalTree {
    root: PathBuf,
    dest: S3Location,
}

impl LocalTree {
    /// Walk `root` and mirror it under `dest`. The root is resolved to its
    /// real path first, so a symlinked root is walked at its target.
    pub fn new(root: impl AsRef<Path>, dest: S3Location) -> Result<Self> {
        Ok(Self {
            root: real_path(root.as_ref())?,
            dest,
        })
    }

    /// Resolved traversal root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/`-joined path below the root. Object keys are UTF-8, so a name
    /// that is not is an error rather than a lossy rename.
    fn relative_key(&self, path: &Path) -> Result<String> {
        let mut parts = Vec::new();
        for component in path.strip_prefix(&self.root).unwrap_or(path).components() {
            let part = component.as_os_str().to_str().ok_or_else(|| {
                CseError::io(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "file name is not valid UTF-8",
                    ),
                )
            })?;
            parts.push(part);
        }
        Ok(parts.join("/"))
    }
}

impl ItemSource for LocalTree {
    fn for_each_item(&mut self, visit: &mut dyn FnMut(ItemRef) -> Result<()>) -> Result<()> {
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                CseError::io(path, source)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = self.relative_key(entry.path())?;

            visit(ItemRef::Upload {
                source: entry.path().to_path_buf(),
                dest: self.dest.join(&relative),
                relative,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_files_only_with_relative_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"1").unwrap();
        std::fs::write(dir.path().join("a/b/deep.txt"), b"2").unwrap();

        let mut tree = LocalTree::new(dir.path(), S3Location::new("bkt", "up")).unwrap();
        let mut items = Vec::new();
        tree.for_each_item(&mut |item| {
            items.push(item);
            Ok(())
        })
        .unwrap();

        let relatives: Vec<&str> = items.iter().map(|i| i.relative_path()).collect();
        assert_eq!(relatives, vec!["a/b/deep.txt", "top.txt"]);
        match &items[0] {
            ItemRef::Upload { dest, .. } => assert_eq!(dest, &S3Location::new("bkt", "up/a/b/deep.txt")),
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let mut tree = LocalTree::new(dir.path(), S3Location::new("bkt", "")).unwrap();
        let mut seen = 0;
        let err = tree
            .for_each_item(&mut |_| {
                seen += 1;
                Err(CseError::PoolStopped)
            })
            .unwrap_err();

        assert!(err.is_pool_stopped());
        assert_eq!(seen, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let bad = dir.path().join(OsStr::from_bytes(b"bad\xff.txt"));
        std::fs::write(&bad, b"x").unwrap();

        let mut tree = LocalTree::new(dir.path(), S3Location::new("bkt", "up")).unwrap();
        let mut seen = 0;
        let err = tree
            .for_each_item(&mut |_| {
                seen += 1;
                Ok(())
            })
            .unwrap_err();

        match err {
            CseError::Io { path, source } => {
                assert_eq!(path.file_name(), bad.file_name());
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(seen, 0);
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(LocalTree::new(dir.path().join("nope"), S3Location::new("b", "")).is_err());
    }
}
