//! Exportable encryption results.
//!
//! sealgate persists nothing. [`EncryptedRecord`] bundles what a caller
//! needs to keep after encrypting, in a JSON-friendly shape: binary fields
//! are base64, the policy reference is hex.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use sealgate_core::{Nonce, PolicyRef};
use sealgate_threshold::BackupKey;

use crate::error::{Result, SealError};

/// The output of one encryption, ready to store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64_backup")]
    pub backup_key: BackupKey,
    pub policy_ref: PolicyRef,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at_ms: i64,
}

impl EncryptedRecord {
    /// The nonce the ciphertext was sealed under.
    pub fn nonce(&self) -> Result<Nonce> {
        Ok(Nonce::from_bytes(self.nonce.clone())?)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SealError::InvalidInput(format!("record: {e}")))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| SealError::InvalidInput(format!("record: {e}")))
    }
}

mod b64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

mod b64_backup {
    use super::*;

    pub fn serialize<S: Serializer>(key: &BackupKey, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(key.as_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BackupKey, D::Error> {
        let bytes = super::b64::deserialize(d)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("backup key must be 32 bytes"))?;
        Ok(BackupKey::from_bytes(arr))
    }
}
