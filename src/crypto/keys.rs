//! Data keys and key wrapping
//!
//! Each object is encrypted under its own 256-bit data key. A [`KeyWrapper`]
//! produces fresh data keys together with a wrapped (encrypted) form that is
//! stored next to the object, and recovers the plaintext key on download.

use crate::error::{CseError, Result};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Data key size in bytes (AES-256)
pub const DATA_KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// Material description stored with each object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDescription {
    /// Identifier of the key-encryption key
    #[serde(rename = "kms_cmk_id")]
    pub key_id: String,
}

/// A plaintext data key and its wrapped form
pub struct DataKey {
    plaintext: [u8; DATA_KEY_SIZE],
    /// Key encrypted under the key-encryption key
    pub wrapped: Vec<u8>,
}

impl DataKey {
    /// Create from parts
    pub fn new(plaintext: &[u8], wrapped: Vec<u8>) -> Result<Self> {
        let plaintext: [u8; DATA_KEY_SIZE] = plaintext.try_into().map_err(|_| {
            CseError::crypto(format!(
                "Data key must be {} bytes, got {}",
                DATA_KEY_SIZE,
                plaintext.len()
            ))
        })?;
        Ok(Self { plaintext, wrapped })
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.plaintext
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        // Zero out key on drop
        for byte in &mut self.plaintext {
            *byte = 0;
        }
    }
}

/// Source of per-object data keys
pub trait KeyWrapper: Send + Sync {
    /// Value stored in the wrap-algorithm metadata header
    fn algorithm(&self) -> &str;

    /// Identifier of the key-encryption key
    fn key_id(&self) -> &str;

    /// Create a fresh data key
    fn generate_data_key(&self) -> Result<DataKey>;

    /// Recover a data key from its wrapped form
    fn unwrap_key(&self, wrapped: &[u8], material: &MaterialDescription) -> Result<DataKey>;
}

/// Key wrapper holding an AES-256 key-encryption key in process
pub struct LocalKeyWrapper {
    key_id: String,
    kek: [u8; DATA_KEY_SIZE],
}

impl LocalKeyWrapper {
    /// Wrap-algorithm name written to object metadata
    pub const ALGORITHM: &'static str = "local-aes-gcm";

    /// Create from a raw key-encryption key
    pub fn new(key_id: impl Into<String>, kek: [u8; DATA_KEY_SIZE]) -> Self {
        Self {
            key_id: key_id.into(),
            kek,
        }
    }

    /// Create with a random key-encryption key
    pub fn generate(key_id: impl Into<String>) -> Self {
        let mut kek = [0u8; DATA_KEY_SIZE];
        OsRng.fill_bytes(&mut kek);
        Self::new(key_id, kek)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.kek)
            .map_err(|e| CseError::crypto(format!("Invalid key-encryption key: {}", e)))
    }
}

impl Drop for LocalKeyWrapper {
    fn drop(&mut self) {
        for byte in &mut self.kek {
            *byte = 0;
        }
    }
}

impl KeyWrapper for LocalKeyWrapper {
    fn algorithm(&self) -> &str {
        Self::ALGORITHM
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn generate_data_key(&self) -> Result<DataKey> {
        let mut plaintext = [0u8; DATA_KEY_SIZE];
        OsRng.fill_bytes(&mut plaintext);

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self.cipher()?.encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: self.key_id.as_bytes(),
            },
        )?;

        let mut wrapped = Vec::with_capacity(NONCE_SIZE + sealed.len());
        wrapped.extend_from_slice(&nonce);
        wrapped.extend_from_slice(&sealed);

        let key = DataKey::new(&plaintext, wrapped);
        plaintext.iter_mut().for_each(|b| *b = 0);
        key
    }

    fn unwrap_key(&self, wrapped: &[u8], material: &MaterialDescription) -> Result<DataKey> {
        if material.key_id != self.key_id {
            return Err(CseError::crypto(format!(
                "Object was encrypted under key '{}', not '{}'",
                material.key_id, self.key_id
            )));
        }
        if wrapped.len() <= NONCE_SIZE {
            return Err(CseError::crypto("Wrapped key too short"));
        }

        let (nonce, sealed) = wrapped.split_at(NONCE_SIZE);
        let plaintext = self.cipher()?.decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: self.key_id.as_bytes(),
            },
        )?;

        DataKey::new(&plaintext, wrapped.to_vec())
    }
}
