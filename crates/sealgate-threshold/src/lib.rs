//! # sealgate threshold
//!
//! Client-side threshold encryption.
//!
//! ## Encryption Model
//!
//! 1. **Data key**: a random ChaCha20-Poly1305 key encrypts the payload, with
//!    the full identity as associated data.
//! 2. **Shares**: the data key is split with Shamir over GF(256); any
//!    `threshold` shares rebuild it.
//! 3. **Sealing**: each share is sealed to one key server via X25519, bound to
//!    the identity. A server releases the unwrapping key only after the
//!    policy predicate approves the requester.
//!
//! The data key doubles as the [`BackupKey`]: whoever encrypted can decrypt
//! without the servers.

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keyshare;
pub mod shamir;

pub use crypto::{EncryptionKey, EncryptionNonce, X25519PublicKey, X25519StaticSecret};
pub use envelope::{BackupKey, EncryptedObject, ServerKey, ENVELOPE_VERSION, MAX_SHARES};
pub use error::{Result, ThresholdError};
pub use keyshare::{SealedKey, SealedShare};
pub use shamir::Share;
