//! Encryption identities.
//!
//! An identity is the byte string the encryption scheme is keyed on:
//!
//! ```text
//! Identity     = policy_ref (32 bytes, left-padded) || nonce_bytes
//! FullIdentity = IDENTITY_SCHEME_V1 || package_id (32 bytes) || Identity
//! ```
//!
//! `Identity` is what the policy predicate receives as its `id` argument, so
//! the predicate can check that the id starts with the policy object's bytes.
//! The policy segment is always [`ID_LENGTH`] bytes; a shorter reference can
//! never shift the boundary between policy and nonce.
//! `FullIdentity` adds the scheme prefix: a version tag and the package that
//! owns the predicate. Changing the layout requires a new scheme tag.
//!
//! Encoding is pure: no I/O, no randomness. Encryption and decryption call
//! sites derive the same bytes from the same inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::types::{PackageId, PolicyRef, ID_LENGTH};

/// Scheme tag for the v1 identity layout.
pub const IDENTITY_SCHEME_V1: u8 = 1;

/// Maximum nonce length in bytes.
pub const MAX_NONCE_LEN: usize = 128;

/// Caller-supplied per-encryption nonce.
///
/// Textual nonces are encoded as UTF-8. Uniqueness per policy is the
/// caller's responsibility; [`Nonce::random`] gives a UUID v4 string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(Vec<u8>);

impl Nonce {
    /// Nonce from text, UTF-8 encoded.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Nonce from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CoreError::MalformedNonce("nonce is empty".into()));
        }
        if bytes.len() > MAX_NONCE_LEN {
            return Err(CoreError::MalformedNonce(format!(
                "nonce is {} bytes, maximum is {MAX_NONCE_LEN}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// A fresh random nonce: the hyphenated text form of a UUID v4.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into_bytes())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "Nonce({text:?})"),
            Err(_) => write!(f, "Nonce(0x{})", hex::encode(&self.0)),
        }
    }
}

/// The policy-scoped identity: `policy_ref || nonce`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(Vec<u8>);

impl Identity {
    /// Derive the identity for a policy reference and nonce.
    pub fn encode(policy: &PolicyRef, nonce: &Nonce) -> Self {
        let mut bytes = Vec::with_capacity(policy.as_bytes().len() + nonce.as_bytes().len());
        bytes.extend_from_slice(policy.as_bytes());
        bytes.extend_from_slice(nonce.as_bytes());
        Self(bytes)
    }

    /// Parse textual inputs and derive the identity.
    pub fn encode_str(policy: &str, nonce: &str) -> Result<Self> {
        Ok(Self::encode(&PolicyRef::parse(policy)?, &Nonce::from_text(nonce)?))
    }

    /// Wrap identity bytes read back from a ciphertext header.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Whether this identity was derived under the given policy.
    pub fn is_scoped_to(&self, policy: &PolicyRef) -> bool {
        self.0.len() > ID_LENGTH && self.0.starts_with(policy.as_bytes())
    }

    /// The policy segment, if the bytes are long enough to carry one.
    pub fn policy_ref(&self) -> Option<PolicyRef> {
        if self.0.len() <= ID_LENGTH {
            return None;
        }
        PolicyRef::from_bytes(self.0[..ID_LENGTH].to_vec()).ok()
    }

    /// Prepend the scheme prefix for `package`.
    pub fn full(&self, package: &PackageId) -> FullIdentity {
        let mut bytes = Vec::with_capacity(1 + package.as_bytes().len() + self.0.len());
        bytes.push(IDENTITY_SCHEME_V1);
        bytes.extend_from_slice(package.as_bytes());
        bytes.extend_from_slice(&self.0);
        FullIdentity(bytes)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity(0x{})", self.to_hex())
    }
}

/// The identity the key servers derive keys for:
/// `scheme tag || package id || identity`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FullIdentity(Vec<u8>);

impl FullIdentity {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The scheme tag.
    pub fn scheme(&self) -> u8 {
        self.0[0]
    }
}

impl AsRef<[u8]> for FullIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FullIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FullIdentity(0x{})", hex::encode(&self.0))
    }
}
