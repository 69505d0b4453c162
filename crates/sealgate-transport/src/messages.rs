//! Messages exchanged with key servers and the ledger.

use bytes::Bytes;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use sealgate_core::canonical::canonical_cbor;
use sealgate_core::{Certificate, Ed25519Signature, ObjectId};
use sealgate_threshold::{SealedKey, X25519PublicKey};

use crate::error::{Result, TransportError};

/// Current fetch-key protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Domain tag for request signatures.
const REQUEST_DOMAIN: &[u8] = b"sealgate-v1-fetch-key";

/// Message size limits.
pub mod limits {
    /// Max ciphertext bytes in a fetch request.
    pub const MAX_REQUEST_CIPHERTEXT: usize = 80 * 1024 * 1024;
    /// Max policy-call bytes in a fetch request.
    pub const MAX_POLICY_CALL: usize = 16 * 1024;
}

/// A key server as published on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerDescriptor {
    pub object_id: ObjectId,
    pub name: String,
    pub url: String,
    /// Master public key shares are sealed to.
    pub public_key: X25519PublicKey,
}

/// Request for the wrap keys of one ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchKeyRequest {
    pub protocol_version: u8,
    /// The encrypted object, shared cheaply across concurrent requests.
    pub ciphertext: Bytes,
    /// Transaction-kind bytes of the policy-check call.
    pub policy_call: Vec<u8>,
    /// One-time key the server seals its answer to.
    pub response_key: X25519PublicKey,
    /// The session credential, public part.
    pub certificate: Certificate,
    /// Session-key signature over [`FetchKeyRequest::signing_bytes`].
    pub request_signature: Ed25519Signature,
}

impl FetchKeyRequest {
    /// The bytes the session key signs.
    ///
    /// Binds the policy call, the response key and a digest of the
    /// ciphertext so a captured request cannot be replayed for another
    /// object or redirected to another response key.
    pub fn signing_bytes(
        ciphertext: &[u8],
        policy_call: &[u8],
        response_key: &X25519PublicKey,
    ) -> Result<Vec<u8>> {
        let value = Value::Array(vec![
            Value::Bytes(REQUEST_DOMAIN.to_vec()),
            Value::Integer(PROTOCOL_VERSION.into()),
            Value::Bytes(blake3::hash(ciphertext).as_bytes().to_vec()),
            Value::Bytes(policy_call.to_vec()),
            Value::Bytes(response_key.as_bytes().to_vec()),
        ]);
        canonical_cbor(&value).map_err(|e| TransportError::Serialization(e.to_string()))
    }

    /// Signing bytes of this request.
    pub fn own_signing_bytes(&self) -> Result<Vec<u8>> {
        Self::signing_bytes(&self.ciphertext, &self.policy_call, &self.response_key)
    }

    /// Check size limits.
    pub fn check_limits(&self) -> Result<()> {
        if self.ciphertext.len() > limits::MAX_REQUEST_CIPHERTEXT {
            return Err(TransportError::InvalidRequest("ciphertext too large".into()));
        }
        if self.policy_call.len() > limits::MAX_POLICY_CALL {
            return Err(TransportError::InvalidRequest("policy call too large".into()));
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

/// Wrap keys released by one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchKeyResponse {
    pub server: ObjectId,
    /// One sealed key per share the server holds for the ciphertext.
    pub keys: Vec<SealedKey>,
}

impl FetchKeyResponse {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}
