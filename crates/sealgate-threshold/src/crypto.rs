//! Primitives shared by share sealing and key responses.
//!
//! X25519 agreement feeds a blake3 KDF; the derived key drives
//! ChaCha20-Poly1305 with the full identity as associated data.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{Result, ThresholdError};

/// A key server's long-term public key, or a client's per-fetch response key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// Secret half of an X25519 pair that is reused across agreements.
///
/// Key servers hold one for their lifetime. A client makes a fresh one per
/// fetch so only it can open the returned keys.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::thread_rng()))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.0.diffie_hellman(&peer_public.to_dalek()).as_bytes())
    }
}

/// Raw X25519 output. Never used as a key directly.
#[derive(Clone)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// KDF over the agreement output. Each `context` part is length-prefixed
    /// so adjacent parts cannot be re-split into the same input.
    pub fn derive_encryption_key(&self, domain: &str, context: &[&[u8]]) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(domain);
        hasher.update(&self.0);
        for part in context {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// Data keys, share-wrap keys and response keys all have this shape.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Seal `plaintext`. `aad` is authenticated but not stored.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(Nonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
            .map_err(|e| ThresholdError::EncryptionError(e.to_string()))
    }

    /// Fails on a wrong key and on any `aad` other than the sealing one.
    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce.0), Payload { msg: ciphertext, aad })
            .map_err(|e| ThresholdError::DecryptionError(e.to_string()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// AEAD nonce, drawn fresh for every sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Sender side of a single sealing: one share, or one key in a response.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Travels next to the sealed value so the recipient can agree.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.secret.diffie_hellman(&peer_public.to_dalek()).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAP: &str = "sealgate-test wrap";
    const IDENTITY: &[u8] = b"\x44\x44\xab\xc1\x23\x6e\x31";

    #[test]
    fn test_server_and_sender_agree_on_wrap_key() {
        let server = X25519StaticSecret::generate();
        let sender = EphemeralKeyPair::generate();
        let sender_public = sender.public_key();

        let sealed_with = sender
            .diffie_hellman(&server.public_key())
            .derive_encryption_key(WRAP, &[IDENTITY, &[1]]);
        let opened_with = server
            .diffie_hellman(&sender_public)
            .derive_encryption_key(WRAP, &[IDENTITY, &[1]]);
        assert_eq!(sealed_with, opened_with);

        let other_index = server
            .diffie_hellman(&sender_public)
            .derive_encryption_key(WRAP, &[IDENTITY, &[2]]);
        assert_ne!(sealed_with, other_index);
    }

    #[test]
    fn test_identity_is_authenticated() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let sealed = key.encrypt(b"share bytes", IDENTITY, &nonce).unwrap();
        assert_eq!(key.decrypt(&sealed, IDENTITY, &nonce).unwrap(), b"share bytes");
        assert!(key.decrypt(&sealed, b"\x44\x44\xab\xc1\x23\x6e\x32", &nonce).is_err());
    }

    #[test]
    fn test_response_key_mismatch() {
        let nonce = EncryptionNonce::generate();
        let sealed = EncryptionKey::generate().encrypt(&[9; 32], IDENTITY, &nonce).unwrap();
        assert!(EncryptionKey::generate().decrypt(&sealed, IDENTITY, &nonce).is_err());
    }

    #[test]
    fn test_context_parts_are_framed() {
        let shared = SharedKey([0x42; 32]);
        let split_late = shared.derive_encryption_key(WRAP, &[b"ab", b"c"]);
        let split_early = shared.derive_encryption_key(WRAP, &[b"a", b"bc"]);
        assert_ne!(split_late, split_early);
        assert_ne!(split_late, shared.derive_encryption_key("sealgate-test other", &[b"ab", b"c"]));
    }
}
