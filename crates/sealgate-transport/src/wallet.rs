//! Wallet signing capability.
//!
//! Session creation asks the user's wallet to sign a personal message. The
//! library treats the wallet as an opaque async signer; verification is the
//! key servers' job.
//!
//! The reference wire format for a wallet signature is
//! `flag (0x00 = Ed25519) || signature (64) || public key (32)`.

use async_trait::async_trait;

use sealgate_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair};

use crate::error::{SignerError, TransportError};

/// Scheme flag for Ed25519 wallet signatures.
pub const ED25519_FLAG: u8 = 0x00;

const WALLET_SIGNATURE_LEN: usize = 1 + 64 + 32;

/// Domain tag prepended to personal messages before signing.
const PERSONAL_MESSAGE_DOMAIN: &[u8] = b"sealgate-v1-personal-message:";

/// Something that can sign personal messages on behalf of an address.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign `message`; returns the serialized wallet signature.
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;
}

fn personal_digest(message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PERSONAL_MESSAGE_DOMAIN.len() + message.len());
    buf.extend_from_slice(PERSONAL_MESSAGE_DOMAIN);
    buf.extend_from_slice(message);
    buf
}

/// Verify a serialized wallet signature over a personal message and check
/// that the signing key controls `expected`.
pub fn verify_personal_message(
    signature: &[u8],
    message: &[u8],
    expected: &Address,
) -> Result<(), TransportError> {
    if signature.len() != WALLET_SIGNATURE_LEN || signature[0] != ED25519_FLAG {
        return Err(TransportError::InvalidRequest("unsupported wallet signature".into()));
    }
    let sig = Ed25519Signature::try_from(&signature[1..65])
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    let mut pk = [0u8; 32];
    pk.copy_from_slice(&signature[65..]);
    let public_key = Ed25519PublicKey::from_bytes(pk);

    if &public_key.to_address() != expected {
        return Err(TransportError::InvalidRequest(
            "wallet key does not control the session address".into(),
        ));
    }
    public_key
        .verify(&personal_digest(message), &sig)
        .map_err(|e| TransportError::InvalidRequest(format!("wallet signature: {e}")))
}

/// A local Ed25519 wallet.
#[derive(Debug, Clone)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    /// Address controlled by this wallet.
    pub fn address(&self) -> Address {
        self.keypair.public_key().to_address()
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        let sig = self.keypair.sign(&personal_digest(message));
        let mut out = Vec::with_capacity(WALLET_SIGNATURE_LEN);
        out.push(ED25519_FLAG);
        out.extend_from_slice(sig.as_bytes());
        out.extend_from_slice(self.keypair.public_key().as_bytes());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wallet_signature_verifies() {
        let wallet = KeypairWallet::generate();
        let sig = wallet.sign_personal_message(b"hello").await.unwrap();

        assert!(verify_personal_message(&sig, b"hello", &wallet.address()).is_ok());
        assert!(verify_personal_message(&sig, b"hellO", &wallet.address()).is_err());
    }

    #[tokio::test]
    async fn test_wallet_signature_wrong_address() {
        let wallet = KeypairWallet::generate();
        let other = KeypairWallet::generate();
        let sig = wallet.sign_personal_message(b"hello").await.unwrap();

        assert!(verify_personal_message(&sig, b"hello", &other.address()).is_err());
    }

    #[test]
    fn test_malformed_signature() {
        assert!(verify_personal_message(&[0u8; 10], b"m", &Address::ZERO).is_err());
        let mut bad_flag = vec![0u8; WALLET_SIGNATURE_LEN];
        bad_flag[0] = 0x01;
        assert!(verify_personal_message(&bad_flag, b"m", &Address::ZERO).is_err());
    }
}
