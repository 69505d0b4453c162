//! Encrypted object envelope.
//!
//! The ciphertext handed back to callers. It carries everything a client
//! needs to ask the key servers for help, and nothing that helps anyone
//! without them:
//!
//! ```text
//! EncryptedObject {
//!     version, package_id, id,          // who may decrypt
//!     threshold, shares[SealedShare],   // how many servers must agree
//!     nonce, ciphertext,                // ChaCha20-Poly1305, aad = full identity
//! }
//! ```

use serde::{Deserialize, Serialize};

use sealgate_core::{FullIdentity, Identity, ObjectId, PackageId};

use crate::crypto::{EncryptionKey, EncryptionNonce, X25519PublicKey};
use crate::error::{Result, ThresholdError};
use crate::keyshare::SealedShare;
use crate::shamir::{self, Share};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Maximum number of shares (GF(256) has 255 non-zero points).
pub const MAX_SHARES: usize = 255;

/// A key server as seen by the encryptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKey {
    pub object_id: ObjectId,
    pub public_key: X25519PublicKey,
    /// Number of shares this server holds.
    pub weight: u8,
}

/// Locally retained data key; decrypts the object without any key server.
#[derive(Clone, PartialEq, Eq)]
pub struct BackupKey(EncryptionKey);

impl BackupKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(EncryptionKey::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for BackupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackupKey(..)")
    }
}

/// A threshold-encrypted payload bound to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    pub version: u8,
    pub package_id: PackageId,
    pub id: Identity,
    pub threshold: u8,
    pub shares: Vec<SealedShare>,
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
}

impl EncryptedObject {
    /// Encrypt `plaintext` so that `threshold` shares from `servers` recover it.
    pub fn seal(
        package_id: PackageId,
        id: Identity,
        threshold: u8,
        servers: &[ServerKey],
        plaintext: &[u8],
    ) -> Result<(Self, BackupKey)> {
        let total: usize = servers.iter().map(|s| s.weight as usize).sum();
        if total == 0 || total > MAX_SHARES {
            return Err(ThresholdError::InvalidParameters(format!(
                "total server weight must be 1..={MAX_SHARES}, got {total}"
            )));
        }
        if servers.iter().any(|s| s.weight == 0) {
            return Err(ThresholdError::InvalidParameters("server weight 0".into()));
        }

        let full_id = id.full(&package_id);
        let data_key = EncryptionKey::generate();
        let shares = shamir::split(data_key.as_bytes(), threshold, total as u8)?;

        let owners = servers
            .iter()
            .flat_map(|s| std::iter::repeat(s).take(s.weight as usize));
        let sealed = shares
            .iter()
            .zip(owners)
            .map(|(share, server)| {
                SealedShare::seal(share, server.object_id, &server.public_key, &full_id)
            })
            .collect::<Result<Vec<_>>>()?;

        let nonce = EncryptionNonce::generate();
        let ciphertext = data_key.encrypt(plaintext, full_id.as_bytes(), &nonce)?;

        let object = Self {
            version: ENVELOPE_VERSION,
            package_id,
            id,
            threshold,
            shares: sealed,
            nonce,
            ciphertext,
        };
        Ok((object, BackupKey(data_key)))
    }

    /// The identity the key servers derive keys for.
    pub fn full_identity(&self) -> FullIdentity {
        self.id.full(&self.package_id)
    }

    /// Distinct key servers named in this object, in share order.
    pub fn servers(&self) -> Vec<ObjectId> {
        let mut servers: Vec<ObjectId> = Vec::new();
        for share in &self.shares {
            if !servers.contains(&share.server) {
                servers.push(share.server);
            }
        }
        servers
    }

    /// Shares held by one server.
    pub fn shares_for(&self, server: &ObjectId) -> impl Iterator<Item = &SealedShare> + '_ {
        let server = *server;
        self.shares.iter().filter(move |s| s.server == server)
    }

    /// Number of shares held by one server.
    pub fn weight_of(&self, server: &ObjectId) -> usize {
        self.shares_for(server).count()
    }

    /// Reconstruct the data key from unwrapped shares and decrypt.
    pub fn open_with_shares(&self, shares: &[Share]) -> Result<Vec<u8>> {
        let needed = &shares[..shares.len().min(self.threshold as usize)];
        let key_bytes = shamir::combine(needed, self.threshold)?;
        let arr: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ThresholdError::DecryptionError("reconstructed key is not 32 bytes".into()))?;
        EncryptionKey::from_bytes(arr).decrypt(&self.ciphertext, self.full_identity().as_bytes(), &self.nonce)
    }

    /// Decrypt locally with the backup key, bypassing the key servers.
    pub fn open_with_backup(&self, key: &BackupKey) -> Result<Vec<u8>> {
        key.0
            .decrypt(&self.ciphertext, self.full_identity().as_bytes(), &self.nonce)
    }

    /// Check structural invariants of a decoded object.
    pub fn validate(&self) -> Result<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(ThresholdError::MalformedCiphertext(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.threshold == 0 || self.threshold as usize > self.shares.len() {
            return Err(ThresholdError::MalformedCiphertext(format!(
                "threshold {} with {} shares",
                self.threshold,
                self.shares.len()
            )));
        }
        if self.shares.len() > MAX_SHARES {
            return Err(ThresholdError::MalformedCiphertext("too many shares".into()));
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| ThresholdError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let object: Self = ciborium::from_reader(bytes)
            .map_err(|e| ThresholdError::MalformedCiphertext(e.to_string()))?;
        object.validate()?;
        Ok(object)
    }
}
