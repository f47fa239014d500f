//! Chunked AES-256-GCM envelope encryption
//!
//! Object bodies are split into 64 KiB chunks, each sealed with AES-256-GCM
//! under the object's data key. The nonce of chunk `n` is the object's base IV
//! with `n` XORed into its trailing eight bytes. The associated data carries
//! the chunk number and a final-chunk flag, so reordering, truncation and
//! appended data all fail authentication. Both directions are streaming
//! [`Read`] adapters.

use crate::crypto::keys::{DataKey, KeyWrapper, MaterialDescription, NONCE_SIZE};
use crate::error::{CseError, Result};
use crate::storage::ObjectHead;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;

/// Plaintext chunk size
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Authentication tag size
pub const TAG_SIZE: usize = 16;

/// Metadata header naming the key wrap algorithm
pub const WRAP_ALG_HEADER: &str = "x-amz-wrap-alg";
/// Metadata header holding the hex wrapped data key
pub const KEY_HEADER: &str = "x-amz-key-v2";
/// Metadata header holding the hex base IV
pub const IV_HEADER: &str = "x-amz-iv";
/// Metadata header naming the content cipher
pub const CEK_ALG_HEADER: &str = "x-amz-cek-alg";
/// Metadata header holding the JSON material description
pub const MATDESC_HEADER: &str = "x-amz-matdesc";
/// Metadata header holding the plaintext length
pub const PLAIN_LEN_HEADER: &str = "x-amz-unencrypted-content-length";

/// Content cipher name written to object metadata
pub const CEK_ALG: &str = "AES/GCM/Chunked64K";

/// Check whether stored object metadata marks an encrypted body
pub fn requires_decryption(head: &ObjectHead) -> bool {
    head.metadata_value(WRAP_ALG_HEADER).is_some()
}

/// Encrypted size of a plaintext of `plain_len` bytes
pub fn ciphertext_len(plain_len: u64) -> u64 {
    let chunks = plain_len.div_ceil(CHUNK_SIZE as u64).max(1);
    plain_len + chunks * TAG_SIZE as u64
}

/// Encrypts and decrypts object bodies with per-object data keys
#[derive(Clone)]
pub struct EnvelopeCipher {
    wrapper: Arc<dyn KeyWrapper>,
}

impl EnvelopeCipher {
    /// Create a cipher using the given key wrapper
    pub fn new(wrapper: Arc<dyn KeyWrapper>) -> Self {
        Self { wrapper }
    }

    /// Key wrapper in use
    pub fn wrapper(&self) -> &dyn KeyWrapper {
        self.wrapper.as_ref()
    }

    /// Wrap `plaintext` in an encrypting reader. Returns the reader and the
    /// metadata that must be stored with the object.
    pub fn encrypt<R: Read>(
        &self,
        plaintext: R,
        plain_len: u64,
    ) -> Result<(EncryptingReader<R>, HashMap<String, String>)> {
        let data_key = self.wrapper.generate_data_key()?;
        let mut base_iv = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut base_iv);

        let material = MaterialDescription {
            key_id: self.wrapper.key_id().to_string(),
        };
        let matdesc = serde_json::to_string(&material)
            .map_err(|e| CseError::crypto(format!("Material description: {}", e)))?;

        let mut metadata = HashMap::new();
        metadata.insert(WRAP_ALG_HEADER.to_string(), self.wrapper.algorithm().to_string());
        metadata.insert(KEY_HEADER.to_string(), hex::encode(&data_key.wrapped));
        metadata.insert(IV_HEADER.to_string(), hex::encode(base_iv));
        metadata.insert(CEK_ALG_HEADER.to_string(), CEK_ALG.to_string());
        metadata.insert(MATDESC_HEADER.to_string(), matdesc);
        metadata.insert(PLAIN_LEN_HEADER.to_string(), plain_len.to_string());

        let reader = EncryptingReader {
            inner: plaintext,
            sealer: ChunkSealer::new(&data_key, base_iv)?,
            lookahead: None,
            out: Vec::new(),
            out_pos: 0,
            done: false,
        };

        Ok((reader, metadata))
    }

    /// Wrap an encrypted object body in a decrypting reader
    pub fn decrypt<R: Read>(&self, ciphertext: R, head: &ObjectHead) -> Result<DecryptingReader<R>> {
        let wrap_alg = head
            .metadata_value(WRAP_ALG_HEADER)
            .ok_or_else(|| CseError::crypto("Object has no key wrap algorithm"))?;
        if wrap_alg != self.wrapper.algorithm() {
            return Err(CseError::crypto(format!(
                "Unsupported key wrap algorithm '{}' (expected '{}')",
                wrap_alg,
                self.wrapper.algorithm()
            )));
        }

        let cek_alg = required(head, CEK_ALG_HEADER)?;
        if cek_alg != CEK_ALG {
            return Err(CseError::crypto(format!("Unsupported content cipher '{}'", cek_alg)));
        }

        let wrapped = hex::decode(required(head, KEY_HEADER)?)
            .map_err(|e| CseError::crypto(format!("Malformed {}: {}", KEY_HEADER, e)))?;
        let iv = hex::decode(required(head, IV_HEADER)?)
            .map_err(|e| CseError::crypto(format!("Malformed {}: {}", IV_HEADER, e)))?;
        let base_iv: [u8; NONCE_SIZE] = iv
            .as_slice()
            .try_into()
            .map_err(|_| CseError::crypto(format!("{} must be {} bytes", IV_HEADER, NONCE_SIZE)))?;
        let material: MaterialDescription = serde_json::from_str(required(head, MATDESC_HEADER)?)
            .map_err(|e| CseError::crypto(format!("Malformed {}: {}", MATDESC_HEADER, e)))?;

        let data_key = self.wrapper.unwrap_key(&wrapped, &material)?;

        Ok(DecryptingReader {
            inner: ciphertext,
            sealer: ChunkSealer::new(&data_key, base_iv)?,
            lookahead: None,
            out: Vec::new(),
            out_pos: 0,
            done: false,
        })
    }
}

fn required<'a>(head: &'a ObjectHead, name: &str) -> Result<&'a str> {
    head.metadata_value(name)
        .ok_or_else(|| CseError::crypto(format!("Missing {} metadata", name)))
}

struct ChunkSealer {
    cipher: Aes256Gcm,
    base_iv: [u8; NONCE_SIZE],
    counter: u64,
}

impl ChunkSealer {
    fn new(key: &DataKey, base_iv: [u8; NONCE_SIZE]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CseError::crypto(format!("Invalid data key: {}", e)))?;
        Ok(Self {
            cipher,
            base_iv,
            counter: 0,
        })
    }

    fn nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = self.base_iv;
        for (slot, b) in nonce[NONCE_SIZE - 8..]
            .iter_mut()
            .zip(self.counter.to_be_bytes())
        {
            *slot ^= b;
        }
        nonce
    }

    fn aad(&self, is_final: bool) -> [u8; 9] {
        let mut aad = [0u8; 9];
        aad[..8].copy_from_slice(&self.counter.to_be_bytes());
        aad[8] = is_final as u8;
        aad
    }

    fn seal(&mut self, chunk: &[u8], is_final: bool) -> io::Result<Vec<u8>> {
        let nonce = self.nonce();
        let aad = self.aad(is_final);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: chunk, aad: &aad })
            .map_err(|_| invalid_data("chunk encryption failed"))?;
        self.counter += 1;
        Ok(sealed)
    }

    fn open(&mut self, chunk: &[u8], is_final: bool) -> io::Result<Vec<u8>> {
        let nonce = self.nonce();
        let aad = self.aad(is_final);
        let opened = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: chunk, aad: &aad })
            .map_err(|_| {
                invalid_data(format!("authentication failed for chunk {}", self.counter))
            })?;
        self.counter += 1;
        Ok(opened)
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Read until `size` bytes or end of stream
fn read_chunk<R: Read>(reader: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(size);
    reader.take(size as u64).read_to_end(&mut chunk)?;
    Ok(chunk)
}

fn drain_into(out: &[u8], out_pos: &mut usize, buf: &mut [u8]) -> usize {
    let n = buf.len().min(out.len() - *out_pos);
    buf[..n].copy_from_slice(&out[*out_pos..*out_pos + n]);
    *out_pos += n;
    n
}

/// Streaming encryptor over a plaintext reader
pub struct EncryptingReader<R> {
    inner: R,
    sealer: ChunkSealer,
    lookahead: Option<Vec<u8>>,
    out: Vec<u8>,
    out_pos: usize,
    done: bool,
}

impl<R: Read> EncryptingReader<R> {
    fn fill(&mut self) -> io::Result<()> {
        let current = match self.lookahead.take() {
            Some(chunk) => chunk,
            None => read_chunk(&mut self.inner, CHUNK_SIZE)?,
        };
        let next = if current.len() < CHUNK_SIZE {
            Vec::new()
        } else {
            read_chunk(&mut self.inner, CHUNK_SIZE)?
        };

        let is_final = next.is_empty();
        self.out = self.sealer.seal(&current, is_final)?;
        self.out_pos = 0;

        if is_final {
            self.done = true;
        } else {
            self.lookahead = Some(next);
        }
        Ok(())
    }
}

impl<R: Read> Read for EncryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.out_pos >= self.out.len() {
            if self.done {
                return Ok(0);
            }
            self.fill()?;
        }
        Ok(drain_into(&self.out, &mut self.out_pos, buf))
    }
}

/// Streaming decryptor over an encrypted object body
pub struct DecryptingReader<R> {
    inner: R,
    sealer: ChunkSealer,
    lookahead: Option<Vec<u8>>,
    out: Vec<u8>,
    out_pos: usize,
    done: bool,
}

impl<R: Read> DecryptingReader<R> {
    fn fill(&mut self) -> io::Result<()> {
        const SEALED_CHUNK: usize = CHUNK_SIZE + TAG_SIZE;

        let current = match self.lookahead.take() {
            Some(chunk) => chunk,
            None => read_chunk(&mut self.inner, SEALED_CHUNK)?,
        };
        if current.is_empty() {
            return Err(invalid_data("encrypted body is truncated"));
        }
        let next = if current.len() < SEALED_CHUNK {
            Vec::new()
        } else {
            read_chunk(&mut self.inner, SEALED_CHUNK)?
        };

        let is_final = next.is_empty();
        self.out = self.sealer.open(&current, is_final)?;
        self.out_pos = 0;

        if is_final {
            self.done = true;
        } else {
            self.lookahead = Some(next);
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Loop: an empty final chunk yields no plaintext
        while self.out_pos >= self.out.len() {
            if self.done {
                return Ok(0);
            }
            self.fill()?;
        }
        Ok(drain_into(&self.out, &mut self.out_pos, buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LocalKeyWrapper;

    fn cipher() -> EnvelopeCipher {
        EnvelopeCipher::new(Arc::new(LocalKeyWrapper::generate("alias/test")))
    }

    fn seal(cipher: &EnvelopeCipher, data: &[u8]) -> (Vec<u8>, ObjectHead) {
        let (mut reader, metadata) = cipher.encrypt(data, data.len() as u64).unwrap();
        let mut sealed = Vec::new();
        reader.read_to_end(&mut sealed).unwrap();
        let head = ObjectHead {
            size: sealed.len() as u64,
            metadata,
        };
        (sealed, head)
    }

    #[test]
    fn test_multi_chunk_body() {
        let cipher = cipher();
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 100).map(|i| (i % 251) as u8).collect();
        let (sealed, head) = seal(&cipher, &data);

        assert_eq!(sealed.len() as u64, ciphertext_len(data.len() as u64));
        assert!(requires_decryption(&head));

        let mut plain = Vec::new();
        cipher.decrypt(&sealed[..], &head).unwrap().read_to_end(&mut plain).unwrap();
        assert_eq!(plain, data);
    }

    #[test]
    fn test_exact_chunk_multiple_and_empty() {
        let cipher = cipher();
        for data in [vec![7u8; CHUNK_SIZE], Vec::new()] {
            let (sealed, head) = seal(&cipher, &data);
            assert_eq!(sealed.len() as u64, ciphertext_len(data.len() as u64));

            let mut plain = Vec::new();
            cipher.decrypt(&sealed[..], &head).unwrap().read_to_end(&mut plain).unwrap();
            assert_eq!(plain, data);
        }
    }

    #[test]
    fn test_truncation_detected() {
        let cipher = cipher();
        let data = vec![1u8; CHUNK_SIZE + 10];
        let (sealed, head) = seal(&cipher, &data);

        // Drop the final chunk entirely
        let truncated = &sealed[..CHUNK_SIZE + TAG_SIZE];
        let mut plain = Vec::new();
        let err = cipher
            .decrypt(truncated, &head)
            .unwrap()
            .read_to_end(&mut plain)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_tampering_detected() {
        let cipher = cipher();
        let (mut sealed, head) = seal(&cipher, b"attack at dawn");
        sealed[3] ^= 0x01;

        let mut plain = Vec::new();
        assert!(cipher
            .decrypt(&sealed[..], &head)
            .unwrap()
            .read_to_end(&mut plain)
            .is_err());
    }

    #[test]
    fn test_wrong_wrap_algorithm_rejected() {
        let cipher = cipher();
        let (sealed, mut head) = seal(&cipher, b"data");
        head.metadata
            .insert(WRAP_ALG_HEADER.to_string(), "kms".to_string());

        assert!(matches!(
            cipher.decrypt(&sealed[..], &head),
            Err(CseError::Crypto(_))
        ));
    }

    #[test]
    fn test_plain_object_not_marked() {
        assert!(!requires_decryption(&ObjectHead::default()));
    }
}
