//! # sealgate core
//!
//! Pure primitives for sealgate: ledger identifiers, encryption identities
//! and session credentials.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PolicyRef`] - Reference to an on-ledger access policy (a whitelist)
//! - [`Nonce`] - Per-encryption nonce
//! - [`Identity`] - `policy_ref || nonce`, the id the policy predicate sees
//! - [`FullIdentity`] - Identity with the versioned scheme prefix
//! - [`SessionCredential`] - Time-limited, wallet-signed capability
//!
//! ## Canonicalization
//!
//! Signed and remotely compared structures are encoded with deterministic
//! CBOR. See [`canonical`].

pub mod canonical;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod session;
pub mod types;

pub use canonical::{canonical_cbor, decode_cbor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use identity::{FullIdentity, Identity, Nonce, IDENTITY_SCHEME_V1, MAX_NONCE_LEN};
pub use session::{
    is_active, now_millis, personal_message, Certificate, SessionCredential, SessionState,
    UnsignedSession, DEFAULT_TTL_MIN, MAX_TTL_MIN,
};
pub use types::{Address, ObjectId, PackageId, PolicyRef, ID_LENGTH};
