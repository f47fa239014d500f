//! Native AWS S3 SDK integration
//!
//! Implements [`ObjectStore`] on top of `aws-sdk-s3`. The SDK is async; the
//! pipeline's workers are plain threads, so every request is driven to
//! completion on a private tokio runtime shared by the session. Object bodies
//! are pulled chunk by chunk through a blocking [`Read`] adapter.

use crate::error::{CseError, Result};
use crate::storage::{ListEntry, ListPage, ObjectBody, ObjectHead, ObjectStore, S3Location};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Read};
use std::sync::Arc;

/// Connection settings for the AWS SDK
#[derive(Debug, Clone)]
pub struct NativeS3Config {
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// Custom endpoint URL for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for some S3-compatible services)
    pub force_path_style: bool,
    /// Access key ID (optional, falls back to AWS credential chain)
    pub access_key_id: Option<String>,
    /// Secret access key (optional, falls back to AWS credential chain)
    pub secret_access_key: Option<String>,
}

impl Default for NativeS3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Loaded AWS configuration plus the runtime that drives SDK futures
#[derive(Clone)]
pub struct AwsSession {
    runtime: Arc<tokio::runtime::Runtime>,
    sdk_config: aws_config::SdkConfig,
    force_path_style: bool,
}

impl AwsSession {
    /// Resolve region, endpoint and credentials
    pub fn connect(config: &NativeS3Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("cse-aws")
            .enable_all()
            .build()
            .map_err(|e| CseError::config(format!("Failed to create runtime: {}", e)))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(ref key_id), Some(ref secret)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let creds = aws_credential_types::Credentials::new(
                key_id,
                secret,
                None, // session token
                None, // expiry
                "s3csecmd-static",
            );
            loader = loader.credentials_provider(creds);
        }

        let sdk_config = runtime.block_on(loader.load());

        Ok(Self {
            runtime: Arc::new(runtime),
            sdk_config,
            force_path_style: config.force_path_style,
        })
    }

    /// Shared SDK configuration
    pub fn sdk_config(&self) -> &aws_config::SdkConfig {
        &self.sdk_config
    }

    /// Run an SDK future to completion from a blocking thread
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Object store backed by `aws-sdk-s3`
pub struct NativeS3Store {
    client: aws_sdk_s3::Client,
    session: AwsSession,
}

impl NativeS3Store {
    /// Create an S3 client from a session
    pub fn new(session: &AwsSession) -> Self {
        let mut s3_config = aws_sdk_s3::config::Builder::from(session.sdk_config());
        if session.force_path_style {
            s3_config = s3_config.force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config.build()),
            session: session.clone(),
        }
    }
}

impl ObjectStore for NativeS3Store {
    fn list_page(&self, bucket: &str, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        let mut request = self.client.list_objects().bucket(bucket).prefix(prefix);
        if let Some(marker) = marker {
            request = request.marker(marker);
        }

        let output = self.session.block_on(request.send()).map_err(|e| {
            CseError::transport("ListObjects", DisplayErrorContext(&e).to_string())
        })?;

        let entries = output
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ListEntry {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        Ok(ListPage {
            entries,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    fn head_object(&self, location: &S3Location) -> Result<ObjectHead> {
        let request = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key);

        let output = self.session.block_on(request.send()).map_err(|e| {
            let message = DisplayErrorContext(&e).to_string();
            let missing = e
                .as_service_error()
                .map(|se| se.is_not_found())
                .unwrap_or(false);
            if missing {
                CseError::not_found("HeadObject", message)
            } else {
                CseError::transport("HeadObject", message)
            }
        })?;

        Ok(ObjectHead {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }

    fn get_object(&self, location: &S3Location) -> Result<ObjectBody> {
        let request = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key);

        let output = self.session.block_on(request.send()).map_err(|e| {
            CseError::transport("GetObject", DisplayErrorContext(&e).to_string())
        })?;

        Ok(Box::new(BlockingBody {
            session: self.session.clone(),
            stream: output.body,
            chunk: Vec::new(),
            pos: 0,
        }))
    }

    fn put_object(
        &self,
        location: &S3Location,
        body: &mut dyn Read,
        metadata: &HashMap<String, String>,
    ) -> Result<u64> {
        // PutObject needs a sized body
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .map_err(|e| CseError::transport("PutObject", e.to_string()))?;
        let len = data.len() as u64;

        let request = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .set_metadata(Some(metadata.clone()))
            .content_length(len as i64)
            .body(ByteStream::from(data));

        self.session.block_on(request.send()).map_err(|e| {
            CseError::transport("PutObject", DisplayErrorContext(&e).to_string())
        })?;

        Ok(len)
    }
}

/// Blocking reader over an SDK byte stream
struct BlockingBody {
    session: AwsSession,
    stream: ByteStream,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for BlockingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            match self.session.block_on(self.stream.next()) {
                Some(Ok(bytes)) => {
                    self.chunk = bytes.to_vec();
                    self.pos = 0;
                }
                Some(Err(e)) => return Err(io::Error::other(e)),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NativeS3Config::default();
        assert_eq!(config.region, "us-east-1");
        assert!(config.endpoint_url.is_none());
        assert!(!config.force_path_style);
    }
}
