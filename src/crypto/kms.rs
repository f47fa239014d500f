//! AWS KMS key wrapping

use crate::crypto::keys::{DataKey, KeyWrapper, MaterialDescription};
use crate::error::{CseError, Result};
use crate::storage::AwsSession;
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;

/// Encryption context key binding a data key to its master key
const CONTEXT_KEY: &str = "kms_cmk_id";

/// Key wrapper delegating to an AWS KMS customer master key
pub struct KmsKeyWrapper {
    client: aws_sdk_kms::Client,
    session: AwsSession,
    key_id: String,
}

impl KmsKeyWrapper {
    /// Wrap-algorithm name written to object metadata
    pub const ALGORITHM: &'static str = "kms";

    /// Create a wrapper for the given key id, alias or ARN
    pub fn new(session: &AwsSession, key_id: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_kms::Client::new(session.sdk_config()),
            session: session.clone(),
            key_id: key_id.into(),
        }
    }
}

impl KeyWrapper for KmsKeyWrapper {
    fn algorithm(&self) -> &str {
        Self::ALGORITHM
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn generate_data_key(&self) -> Result<DataKey> {
        let request = self
            .client
            .generate_data_key()
            .key_id(&self.key_id)
            .key_spec(DataKeySpec::Aes256)
            .encryption_context(CONTEXT_KEY, &self.key_id);

        let output = self.session.block_on(request.send()).map_err(|e| {
            CseError::crypto(format!("GenerateDataKey: {}", DisplayErrorContext(&e)))
        })?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| CseError::crypto("GenerateDataKey returned no plaintext key"))?;
        let wrapped = output
            .ciphertext_blob()
            .ok_or_else(|| CseError::crypto("GenerateDataKey returned no ciphertext blob"))?;

        DataKey::new(plaintext.as_ref(), wrapped.as_ref().to_vec())
    }

    fn unwrap_key(&self, wrapped: &[u8], material: &MaterialDescription) -> Result<DataKey> {
        let request = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped.to_vec()))
            .encryption_context(CONTEXT_KEY, &material.key_id);

        let output = self.session.block_on(request.send()).map_err(|e| {
            CseError::crypto(format!("Decrypt: {}", DisplayErrorContext(&e)))
        })?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| CseError::crypto("Decrypt returned no plaintext key"))?;

        DataKey::new(plaintext.as_ref(), wrapped.to_vec())
    }
}
