//! Session credentials.
//!
//! A session credential is a short-lived capability: the user's wallet signs
//! a personal message naming a package, a TTL, a start time and an ephemeral
//! session public key. Key servers accept requests signed by that session key
//! until the TTL runs out.
//!
//! Lifecycle:
//!
//! ```text
//! UnsignedSession --attach_signature--> SessionCredential (active)
//!                                         |
//!                                         | now >= created_at + ttl
//!                                         v
//!                                       expired
//! ```
//!
//! Expiry is evaluated lazily whenever the credential is presented. A
//! credential never changes after construction and is never renewed; callers
//! create a new one.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CoreError, Result};
use crate::types::{Address, PackageId};

/// Default session lifetime in minutes.
pub const DEFAULT_TTL_MIN: u16 = 10;

/// Longest session lifetime a credential may request.
pub const MAX_TTL_MIN: u16 = 30;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Build the message the wallet is asked to sign.
///
/// Format:
/// `Accessing keys of package 0x{package} for {ttl} mins from {YYYY-MM-DD HH:MM:SS} UTC, session key {base64(session_pk)}`
pub fn personal_message(
    package_id: &PackageId,
    ttl_min: u16,
    created_at_ms: i64,
    session_key: &Ed25519PublicKey,
) -> Vec<u8> {
    let start = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(created_at_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| created_at_ms.to_string());
    let session_key = base64::engine::general_purpose::STANDARD.encode(session_key.as_bytes());
    format!(
        "Accessing keys of package {package_id} for {ttl_min} mins from {start} UTC, session key {session_key}"
    )
    .into_bytes()
}

fn validate_ttl(ttl_min: u16) -> Result<()> {
    if ttl_min == 0 || ttl_min > MAX_TTL_MIN {
        return Err(CoreError::InvalidSession(format!(
            "ttl must be 1..={MAX_TTL_MIN} minutes, got {ttl_min}"
        )));
    }
    Ok(())
}

/// A session that has not been authorized by the wallet yet.
pub struct UnsignedSession {
    address: Address,
    package_id: PackageId,
    created_at_ms: i64,
    ttl_min: u16,
    session_key: Keypair,
}

impl UnsignedSession {
    /// Start a session with a fresh session key.
    pub fn new(
        address: Address,
        package_id: PackageId,
        ttl_min: u16,
        created_at_ms: i64,
    ) -> Result<Self> {
        Self::with_session_key(address, package_id, ttl_min, created_at_ms, Keypair::generate())
    }

    /// Start a session with a given session key.
    pub fn with_session_key(
        address: Address,
        package_id: PackageId,
        ttl_min: u16,
        created_at_ms: i64,
        session_key: Keypair,
    ) -> Result<Self> {
        validate_ttl(ttl_min)?;
        Ok(Self {
            address,
            package_id,
            created_at_ms,
            ttl_min,
            session_key,
        })
    }

    /// The message the wallet must sign to activate this session.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.package_id,
            self.ttl_min,
            self.created_at_ms,
            &self.session_key.public_key(),
        )
    }

    /// Attach the wallet signature, producing an active credential.
    ///
    /// The signature is opaque here; key servers verify it.
    pub fn attach_signature(self, signature: Vec<u8>) -> Result<SessionCredential> {
        if signature.is_empty() {
            return Err(CoreError::InvalidSession("empty wallet signature".into()));
        }
        Ok(SessionCredential {
            address: self.address,
            package_id: self.package_id,
            created_at_ms: self.created_at_ms,
            ttl_min: self.ttl_min,
            session_key: self.session_key,
            signature,
        })
    }
}

impl fmt::Debug for UnsignedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedSession")
            .field("address", &self.address)
            .field("package_id", &self.package_id)
            .field("created_at_ms", &self.created_at_ms)
            .field("ttl_min", &self.ttl_min)
            .finish_non_exhaustive()
    }
}

/// Observed state of a credential at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Expired,
}

/// An active, wallet-signed session credential.
///
/// Immutable. Safe to share across concurrent decrypt calls.
#[derive(Clone)]
pub struct SessionCredential {
    address: Address,
    package_id: PackageId,
    created_at_ms: i64,
    ttl_min: u16,
    session_key: Keypair,
    signature: Vec<u8>,
}

impl SessionCredential {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn ttl_min(&self) -> u16 {
        self.ttl_min
    }

    /// First instant at which the credential is no longer active.
    pub fn expires_at_ms(&self) -> i64 {
        self.created_at_ms
            .saturating_add(i64::from(self.ttl_min) * MILLIS_PER_MINUTE)
    }

    pub fn session_public_key(&self) -> Ed25519PublicKey {
        self.session_key.public_key()
    }

    pub fn wallet_signature(&self) -> &[u8] {
        &self.signature
    }

    /// Whether the credential may be presented at `now_ms`.
    pub fn is_active(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms()
    }

    pub fn state(&self, now_ms: i64) -> SessionState {
        if self.is_active(now_ms) {
            SessionState::Active
        } else {
            SessionState::Expired
        }
    }

    /// Whether this credential was issued for `address` under `package_id`.
    pub fn matches(&self, address: &Address, package_id: &PackageId) -> bool {
        &self.address == address && &self.package_id == package_id
    }

    /// The public part of the credential sent to key servers.
    pub fn certificate(&self) -> Certificate {
        Certificate {
            user: self.address,
            package_id: self.package_id,
            session_key: self.session_key.public_key(),
            created_at_ms: self.created_at_ms,
            ttl_min: self.ttl_min,
            signature: self.signature.clone(),
        }
    }

    /// Sign a request body with the session key.
    pub fn sign_request(&self, body: &[u8]) -> Ed25519Signature {
        self.session_key.sign(body)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("address", &self.address)
            .field("package_id", &self.package_id)
            .field("created_at_ms", &self.created_at_ms)
            .field("ttl_min", &self.ttl_min)
            .field("session_key", &self.session_key.public_key())
            .finish_non_exhaustive()
    }
}

/// Validity predicate over a credential.
pub fn is_active(credential: &SessionCredential, now_ms: i64) -> bool {
    credential.is_active(now_ms)
}

/// Public, transmittable form of a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub user: Address,
    pub package_id: PackageId,
    pub session_key: Ed25519PublicKey,
    pub created_at_ms: i64,
    pub ttl_min: u16,
    /// Wallet signature over [`Certificate::personal_message`].
    pub signature: Vec<u8>,
}

impl Certificate {
    /// Reconstruct the personal message the wallet signed.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.package_id,
            self.ttl_min,
            self.created_at_ms,
            &self.session_key,
        )
    }

    /// Whether the certificate is still within its TTL.
    pub fn is_active(&self, now_ms: i64) -> bool {
        validate_ttl(self.ttl_min).is_ok()
            && now_ms
                < self
                    .created_at_ms
                    .saturating_add(i64::from(self.ttl_min) * MILLIS_PER_MINUTE)
    }
}
