//! Local path checks used before and during a transfer run

use crate::error::{CseError, IoResultExt, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Symlink hops followed before giving up on a destination
const MAX_LINK_DEPTH: usize = 40;

/// Check whether `path` can receive a downloaded tree.
///
/// A path qualifies if it does not exist yet, is a directory, or is a
/// symlink whose target qualifies by the same rule. An unreadable link
/// target is reported as not writable; other stat failures propagate.
pub fn is_dir_writable(path: &Path) -> Result<bool> {
    let mut current = path.to_path_buf();

    for _ in 0..MAX_LINK_DEPTH {
        let meta = match std::fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(CseError::io(&current, e)),
        };

        if !meta.file_type().is_symlink() {
            return Ok(meta.is_dir());
        }

        let target = match std::fs::read_link(&current) {
            Ok(target) => target,
            Err(_) => return Ok(false),
        };
        current = match current.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
    }

    // Link cycle
    Ok(false)
}

/// Canonical, symlink-free form of a traversal root
pub fn real_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).with_path(path)
}

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_path_is_writable() {
        let dir = TempDir::new().unwrap();
        assert!(is_dir_writable(&dir.path().join("not-yet")).unwrap());
    }

    #[test]
    fn test_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(is_dir_writable(dir.path()).unwrap());
        assert!(!is_dir_writable(&file).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_followed() {
        let dir = TempDir::new().unwrap();
        let target_dir = dir.path().join("real");
        std::fs::create_dir(&target_dir).unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();

        let to_dir = dir.path().join("to-dir");
        let to_file = dir.path().join("to-file");
        let relative = dir.path().join("relative");
        std::os::unix::fs::symlink(&target_dir, &to_dir).unwrap();
        std::os::unix::fs::symlink(&file, &to_file).unwrap();
        std::os::unix::fs::symlink("real", &relative).unwrap();

        assert!(is_dir_writable(&to_dir).unwrap());
        assert!(!is_dir_writable(&to_file).unwrap());
        assert!(is_dir_writable(&relative).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_cycle_not_writable() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();

        assert!(!is_dir_writable(&a).unwrap());
    }

    #[test]
    fn test_real_path_and_parent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c.txt");
        ensure_parent_dir(&nested).unwrap();
        assert!(dir.path().join("a/b").is_dir());

        let resolved = real_path(&dir.path().join("a/./b")).unwrap();
        assert_eq!(resolved, real_path(&dir.path().join("a/b")).unwrap());
        assert!(real_path(&dir.path().join("missing")).is_err());
    }
}
