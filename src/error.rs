//! Error types for s3csecmd
//!
//! One enum covers every failure a copy run can surface: validation of the
//! locators before the pipeline starts, submission to a stopped pool, remote
//! transport failures, local I/O, and item-level failures reported through the
//! worker pool's outcome stream.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for s3csecmd operations
#[derive(Error, Debug)]
pub enum CseError {
    /// The string is not an `s3://bucket/key` locator
    #[error("Invalid S3 location: {0}")]
    InvalidLocation(String),

    /// The key points at an existing object instead of a folder prefix
    #[error("S3 key must point to an S3 folder: {0}")]
    InvalidFolder(String),

    /// The local destination cannot receive a folder
    #[error("Folder is not writable: {0}")]
    FolderNotWritable(PathBuf),

    /// Local source is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Submission attempted after the worker pool was stopped
    #[error("Worker pool has been stopped")]
    PoolStopped,

    /// Listing, metadata or transfer failure from the object store
    #[error("S3 {operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
        not_found: bool,
    },

    /// I/O error during local file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An item transfer failed inside a worker
    #[error("Transfer of '{item}' failed: {source}")]
    Task {
        item: String,
        #[source]
        source: Box<CseError>,
    },

    /// Envelope encryption or key wrapping failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CseError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a transport error for the named store operation
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            not_found: false,
        }
    }

    /// Create a transport error for a key that does not exist
    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            not_found: true,
        }
    }

    /// Wrap an item-level failure
    pub fn task(item: impl Into<String>, source: CseError) -> Self {
        Self::Task {
            item: item.into(),
            source: Box::new(source),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Errors detected before any worker is spawned
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidLocation(_)
                | Self::InvalidFolder(_)
                | Self::FolderNotWritable(_)
                | Self::NotADirectory(_)
        )
    }

    /// Check if this is the stopped-pool submission error
    pub fn is_pool_stopped(&self) -> bool {
        matches!(self, Self::PoolStopped)
    }

    /// Check if the store reported a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport { not_found: true, .. })
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::FolderNotWritable(path) | Self::NotADirectory(path) => {
                Some(path)
            }
            Self::Task { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for s3csecmd operations
pub type Result<T> = std::result::Result<T, CseError>;

impl From<std::io::Error> for CseError {
    fn from(err: std::io::Error) -> Self {
        CseError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<aes_gcm::Error> for CseError {
    fn from(_: aes_gcm::Error) -> Self {
        // aes_gcm::Error is opaque
        CseError::Crypto("authenticated encryption failure".to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| CseError::io(path, e))
    }
}
