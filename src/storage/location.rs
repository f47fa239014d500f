//! `s3://bucket/key` locators

use crate::error::{CseError, Result};
use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

/// Scheme marker that identifies a remote locator
pub const S3_SCHEME: &str = "s3://";

/// Check whether a command-line path names a remote location
pub fn is_remote_locator(path: &str) -> bool {
    path.contains(S3_SCHEME)
}

/// A bucket and key inside the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Location {
    /// Bucket name (URI authority)
    pub bucket: String,
    /// Object key or folder prefix, without leading/trailing `/`
    pub key: String,
}

impl S3Location {
    /// Create a location from parts
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_matches('/').to_string(),
        }
    }

    /// Parse an `s3://bucket/key...` string
    pub fn parse(path: &str) -> Result<Self> {
        if !is_remote_locator(path) {
            return Err(CseError::InvalidLocation(path.to_string()));
        }

        let url = Url::parse(path)
            .map_err(|e| CseError::InvalidLocation(format!("{}: {}", path, e)))?;
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CseError::InvalidLocation(path.to_string()))?;

        // Url keeps the path percent-encoded; keys are stored decoded
        let key = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|e| CseError::InvalidLocation(format!("{}: {}", path, e)))?;

        Ok(Self::new(bucket, key.into_owned()))
    }

    /// Listing prefix for the folder this location names
    pub fn folder_prefix(&self) -> String {
        if self.key.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key)
        }
    }

    /// Location of `relative` under this folder
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_matches('/');
        if self.key.is_empty() {
            Self::new(self.bucket.clone(), relative)
        } else {
            Self::new(self.bucket.clone(), format!("{}/{}", self.key, relative))
        }
    }

    /// Sibling location in the same bucket
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(self.bucket.clone(), key)
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.key)
    }
}
