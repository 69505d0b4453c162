//! Sealing key shares to key servers.
//!
//! Every Shamir share of the data key is sealed to one key server:
//!
//! 1. an ephemeral X25519 key agrees a secret with the server's public key;
//! 2. the wrap key is derived from that secret and bound to the full
//!    identity, the server and the share index;
//! 3. the share is encrypted under the wrap key.
//!
//! Only the server can derive the wrap key, and it does so only after the
//! policy predicate approves the requester. The server never sees the share
//! itself: it returns the wrap key sealed to the requester's one-time
//! response key ([`SealedKey`]), and the client unwraps the share locally.

use serde::{Deserialize, Serialize};

use sealgate_core::{FullIdentity, ObjectId};

use crate::crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret,
};
use crate::error::{Result, ThresholdError};
use crate::shamir::Share;

const SHARE_WRAP_DOMAIN: &str = "sealgate-v1-share-wrap";
const RESPONSE_DOMAIN: &str = "sealgate-v1-key-response";

/// A Shamir share encrypted to a single key server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedShare {
    /// Key server able to derive the wrap key.
    pub server: ObjectId,

    /// Shamir evaluation point of the share.
    pub index: u8,

    /// Ephemeral X25519 public key (encryptor's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The share value, encrypted under the wrap key.
    pub encrypted_share: Vec<u8>,
}

fn wrap_context<'a>(identity: &'a FullIdentity, server: &'a ObjectId, index: &'a [u8; 1]) -> [&'a [u8]; 3] {
    [identity.as_bytes(), server.as_bytes(), index]
}

impl SealedShare {
    /// Seal `share` to `server_public` for `identity`.
    pub fn seal(
        share: &Share,
        server: ObjectId,
        server_public: &X25519PublicKey,
        identity: &FullIdentity,
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(server_public);

        let index = [share.index];
        let wrap_key =
            shared.derive_encryption_key(SHARE_WRAP_DOMAIN, &wrap_context(identity, &server, &index));

        let nonce = EncryptionNonce::generate();
        let encrypted_share = wrap_key.encrypt(&share.value, identity.as_bytes(), &nonce)?;

        Ok(Self {
            server,
            index: share.index,
            ephemeral_public,
            nonce,
            encrypted_share,
        })
    }

    /// Server side: derive the wrap key for this share.
    ///
    /// Called by a key server after it has approved the request.
    pub fn derive_wrap_key(
        &self,
        server_secret: &X25519StaticSecret,
        identity: &FullIdentity,
    ) -> EncryptionKey {
        let shared = server_secret.diffie_hellman(&self.ephemeral_public);
        let index = [self.index];
        shared.derive_encryption_key(SHARE_WRAP_DOMAIN, &wrap_context(identity, &self.server, &index))
    }

    /// Client side: decrypt the share with a wrap key returned by the server.
    pub fn open(&self, wrap_key: &EncryptionKey, identity: &FullIdentity) -> Result<Share> {
        let value = wrap_key.decrypt(&self.encrypted_share, identity.as_bytes(), &self.nonce)?;
        Ok(Share {
            index: self.index,
            value,
        })
    }
}

/// A wrap key encrypted to the requester's one-time response key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Share index the wrapped key belongs to.
    pub index: u8,

    /// Ephemeral X25519 public key (server's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The wrap key, encrypted.
    pub encrypted_key: Vec<u8>,
}

impl SealedKey {
    /// Seal `wrap_key` to the requester's response public key.
    pub fn seal(
        index: u8,
        wrap_key: &EncryptionKey,
        recipient_public: &X25519PublicKey,
        identity: &FullIdentity,
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient_public);
        let key = shared.derive_encryption_key(RESPONSE_DOMAIN, &[identity.as_bytes(), &[index]]);

        let nonce = EncryptionNonce::generate();
        let encrypted_key = key.encrypt(wrap_key.as_bytes(), identity.as_bytes(), &nonce)?;

        Ok(Self {
            index,
            ephemeral_public,
            nonce,
            encrypted_key,
        })
    }

    /// Decrypt the wrap key using the requester's response secret.
    pub fn open(
        &self,
        recipient_secret: &X25519StaticSecret,
        identity: &FullIdentity,
    ) -> Result<EncryptionKey> {
        let shared = recipient_secret.diffie_hellman(&self.ephemeral_public);
        let key = shared.derive_encryption_key(RESPONSE_DOMAIN, &[identity.as_bytes(), &[self.index]]);
        let key_bytes = key.decrypt(&self.encrypted_key, identity.as_bytes(), &self.nonce)?;

        let arr: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            ThresholdError::DecryptionError(format!(
                "invalid key length: expected 32, got {}",
                key_bytes.len()
            ))
        })?;
        Ok(EncryptionKey::from_bytes(arr))
    }
}
