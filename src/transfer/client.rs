//! Transfer client
//!
//! Downloads check the object's metadata first: an object carrying a key wrap
//! algorithm is streamed through the decrypting reader, anything else is
//! copied as stored. Uploads are always encrypted.

use crate::config::TransferConfig;
use crate::core::{run_pipeline, Job, RunSummary, WorkerPool};
use crate::crypto::{requires_decryption, EnvelopeCipher};
use crate::enumerate::{submit_all, ItemRef, LocalTree, RemoteListing};
use crate::error::{CseError, IoResultExt, Result};
use crate::fs::{ensure_parent_dir, is_dir_writable};
use crate::progress::ProgressReporter;
use crate::storage::{ObjectStore, S3Location};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Copy buffer size
const BUFFER_SIZE: usize = 64 * 1024;

/// Copies items between the local filesystem and an object store
#[derive(Clone)]
pub struct TransferClient {
    store: Arc<dyn ObjectStore>,
    cipher: EnvelopeCipher,
    config: TransferConfig,
    progress: Option<Arc<ProgressReporter>>,
}

impl TransferClient {
    /// Create a client over a store and cipher
    pub fn new(store: Arc<dyn ObjectStore>, cipher: EnvelopeCipher, config: TransferConfig) -> Self {
        Self {
            store,
            cipher,
            config,
            progress: None,
        }
    }

    /// Report items and bytes to a progress reporter
    pub fn with_progress(mut self, progress: Arc<ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Fetch one object into `dest`, decrypting it when its metadata says so
    pub fn download_file(&self, source: &S3Location, dest: &Path) -> Result<u64> {
        let head = self.store.head_object(source)?;
        let body = self.store.get_object(source)?;
        let mut reader: Box<dyn Read + Send> = if requires_decryption(&head) {
            Box::new(self.cipher.decrypt(body, &head)?)
        } else {
            body
        };

        ensure_parent_dir(dest)?;
        let file = File::create(dest).with_path(dest)?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

        let written = self.copy_stream(&mut reader, &mut writer, dest, |e| {
            if e.kind() == io::ErrorKind::InvalidData {
                CseError::crypto(format!("{}: {}", source, e))
            } else {
                CseError::transport("GetObject", e.to_string())
            }
        })?;

        writer.flush().with_path(dest)?;
        Ok(written)
    }

    /// Encrypt one local file and store it at `dest`
    pub fn upload_file(&self, source: &Path, dest: &S3Location) -> Result<u64> {
        let file = File::open(source).with_path(source)?;
        let plain_len = file.metadata().with_path(source)?.len();

        let (mut reader, metadata) = self
            .cipher
            .encrypt(BufReader::with_capacity(BUFFER_SIZE, file), plain_len)?;
        self.store.put_object(dest, &mut reader, &metadata)?;

        if let Some(progress) = &self.progress {
            progress.increment_bytes(plain_len);
        }
        Ok(plain_len)
    }

    /// Reject a key that names an existing object rather than a folder.
    /// An empty key (bucket root) is always a folder.
    pub fn validate_folder_key(&self, location: &S3Location) -> Result<()> {
        if location.key.is_empty() {
            return Ok(());
        }

        match self.store.head_object(location) {
            Ok(_) => Err(CseError::InvalidFolder(location.to_string())),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn set_status(&self, msg: &str) {
        if let Some(progress) = &self.progress {
            progress.set_status(msg);
        }
    }

    /// Mirror a remote folder into a local directory
    pub fn download_folder(&self, source: &S3Location, dest: &Path) -> Result<RunSummary> {
        if !is_dir_writable(dest)? {
            return Err(CseError::FolderNotWritable(dest.to_path_buf()));
        }
        self.validate_folder_key(source)?;

        info!("Downloading {} to {}", source, dest.display());
        self.set_status(&format!("listing {}", source));
        let mut listing = RemoteListing::new(self.store.clone(), source.clone(), dest);
        self.run(move |pool| {
            submit_all(&mut listing, pool, |item| self.job_for(item)).map(|_| ())
        })
    }

    /// Mirror a local directory into a remote folder
    pub fn upload_folder(&self, source: &Path, dest: &S3Location) -> Result<RunSummary> {
        let meta = std::fs::metadata(source).with_path(source)?;
        if !meta.is_dir() {
            return Err(CseError::NotADirectory(source.to_path_buf()));
        }

        info!("Uploading {} to {}", source.display(), dest);
        self.set_status(&format!("scanning {}", source.display()));
        let mut tree = LocalTree::new(source, dest.clone())?;
        self.run(move |pool| submit_all(&mut tree, pool, |item| self.job_for(item)).map(|_| ()))
    }

    /// Transfer one item in either direction
    pub fn transfer(&self, item: &ItemRef) -> Result<u64> {
        match item {
            ItemRef::Download {
                source,
                dest,
                relative,
            } => {
                debug!("Downloading {} ...", relative);
                self.download_file(source, dest)
            }
            ItemRef::Upload {
                source,
                dest,
                relative,
            } => {
                debug!("Uploading {} ...", relative);
                self.upload_file(source, dest)
            }
        }
    }

    fn job_for(&self, item: ItemRef) -> Box<dyn Job> {
        Box::new(TransferJob {
            client: self.clone(),
            item,
        })
    }

    fn run<P>(&self, producer: P) -> Result<RunSummary>
    where
        P: FnOnce(&WorkerPool) -> Result<()> + Send,
    {
        let result = run_pipeline(self.config.workers, self.progress.as_deref(), producer);

        match &result {
            Ok(summary) => {
                info!(
                    "Transferred {} items in {:.2?}",
                    summary.tasks_completed, summary.duration
                );
                if let Some(progress) = &self.progress {
                    progress.finish_success(&format!("{} items", summary.tasks_completed));
                }
            }
            Err(e) => {
                if let Some(progress) = &self.progress {
                    progress.finish_error(&e.to_string());
                }
            }
        }
        result
    }

    fn copy_stream<R, W, F>(&self, reader: &mut R, writer: &mut W, dest: &Path, on_read: F) -> Result<u64>
    where
        R: Read + ?Sized,
        W: Write,
        F: Fn(io::Error) -> CseError,
    {
        let mut buf = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(on_read(e)),
            };
            writer.write_all(&buf[..n]).with_path(dest)?;
            total += n as u64;

            if let Some(progress) = &self.progress {
                progress.increment_bytes(n as u64);
            }
        }

        Ok(total)
    }
}

/// Pool job transferring one item
struct TransferJob {
    client: TransferClient,
    item: ItemRef,
}

impl Job for TransferJob {
    fn run(self: Box<Self>) -> Result<()> {
        self.client.transfer(&self.item).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{LocalKeyWrapper, WRAP_ALG_HEADER};
    use crate::storage::MemoryStore;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn client(store: Arc<MemoryStore>) -> TransferClient {
        let wrapper = Arc::new(LocalKeyWrapper::generate("alias/test"));
        let config = TransferConfig {
            workers: 2,
            kms_id: "alias/test".to_string(),
            ..TransferConfig::default()
        };
        TransferClient::new(store, EnvelopeCipher::new(wrapper), config)
    }

    #[test]
    fn test_upload_then_download_file() {
        let store = Arc::new(MemoryStore::new());
        let client = client(store.clone());
        let dir = TempDir::new().unwrap();

        let src = dir.path().join("plain.txt");
        std::fs::write(&src, b"secret payload").unwrap();
        let loc = S3Location::new("bkt", "docs/plain.txt");

        assert_eq!(client.upload_file(&src, &loc).unwrap(), 14);
        let stored = store.object_data(&loc).unwrap();
        assert_ne!(stored, b"secret payload");
        assert!(store.object_metadata(&loc).unwrap().contains_key(WRAP_ALG_HEADER));

        let dest = dir.path().join("out/nested/plain.txt");
        client.download_file(&loc, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"secret payload");
    }

    #[test]
    fn test_plain_object_copied_as_is() {
        let store = Arc::new(MemoryStore::new());
        let loc = S3Location::new("bkt", "raw.bin");
        store.insert(&loc, b"not encrypted".to_vec());

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("raw.bin");
        client(store).download_file(&loc, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"not encrypted");
    }

    #[test]
    fn test_unknown_wrap_algorithm() {
        let store = Arc::new(MemoryStore::new());
        let loc = S3Location::new("bkt", "foreign.bin");
        let mut metadata = HashMap::new();
        metadata.insert("X-Amz-Wrap-Alg".to_string(), "kms".to_string());
        store.insert_with_metadata(&loc, b"??".to_vec(), metadata);

        let dir = TempDir::new().unwrap();
        let err = client(store)
            .download_file(&loc, &dir.path().join("f"))
            .unwrap_err();
        assert!(matches!(err, CseError::Crypto(_)));
    }

    #[test]
    fn test_validate_folder_key() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&S3Location::new("bkt", "file.txt"), b"x".to_vec());
        let client = client(store.clone());

        assert!(client.validate_folder_key(&S3Location::new("bkt", "")).is_ok());
        assert!(client.validate_folder_key(&S3Location::new("bkt", "folder")).is_ok());
        assert!(matches!(
            client.validate_folder_key(&S3Location::new("bkt", "file.txt")),
            Err(CseError::InvalidFolder(_))
        ));

        store.fail_key("broken");
        assert!(matches!(
            client.validate_folder_key(&S3Location::new("bkt", "broken")),
            Err(CseError::Transport { .. })
        ));
    }

    #[test]
    fn test_upload_folder_requires_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let client = client(Arc::new(MemoryStore::new()));
        let dest = S3Location::new("bkt", "p");

        assert!(matches!(
            client.upload_folder(&file, &dest),
            Err(CseError::NotADirectory(_))
        ));
        assert!(matches!(
            client.upload_folder(&dir.path().join("missing"), &dest),
            Err(CseError::Io { .. })
        ));
    }

    #[test]
    fn test_download_folder_rejects_file_destination() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();

        let err = client(Arc::new(MemoryStore::new()))
            .download_folder(&S3Location::new("bkt", "p"), &file)
            .unwrap_err();
        assert!(err.is_validation());
    }
}
