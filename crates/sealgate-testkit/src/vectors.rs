//! Golden test vectors for deterministic verification.
//!
//! Key servers and other clients must derive the same identity bytes and
//! ask wallets to sign the same session message, byte for byte.

use sealgate_core::{personal_message, Identity, Keypair, PackageId};

/// A golden identity vector.
#[derive(Debug, Clone)]
pub struct IdentityVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Policy reference as a caller writes it.
    pub policy_ref: &'static str,
    /// Textual nonce.
    pub nonce: &'static str,
    /// Expected identity (hex).
    pub expected_identity: &'static str,
}

/// Get all identity vectors.
pub fn identity_vectors() -> Vec<IdentityVector> {
    vec![
        IdentityVector {
            name: "short reference with prefix",
            policy_ref: "0xabc123",
            nonce: "n1",
            expected_identity: "0000000000000000000000000000000000000000000000000000000000abc1236e31",
        },
        IdentityVector {
            name: "uppercase reference",
            policy_ref: "0xABC123",
            nonce: "n1",
            expected_identity: "0000000000000000000000000000000000000000000000000000000000abc1236e31",
        },
        IdentityVector {
            name: "reference without prefix",
            policy_ref: "abc123",
            nonce: "n1",
            expected_identity: "0000000000000000000000000000000000000000000000000000000000abc1236e31",
        },
        IdentityVector {
            name: "single byte reference",
            policy_ref: "0x01",
            nonce: "a",
            expected_identity: "000000000000000000000000000000000000000000000000000000000000000161",
        },
        IdentityVector {
            name: "full width reference",
            policy_ref: "0x1111111111111111111111111111111111111111111111111111111111111111",
            nonce: "job-42",
            expected_identity: "11111111111111111111111111111111111111111111111111111111111111116a6f622d3432",
        },
        IdentityVector {
            name: "shorter reference does not shift into nonce",
            policy_ref: "0xabc1",
            nonce: "#n1",
            expected_identity: "000000000000000000000000000000000000000000000000000000000000abc1236e31",
        },
        IdentityVector {
            name: "multibyte nonce",
            policy_ref: "0xff",
            nonce: "é",
            expected_identity: "00000000000000000000000000000000000000000000000000000000000000ffc3a9",
        },
    ]
}

/// Derive the identity for a vector.
pub fn identity_from_vector(vector: &IdentityVector) -> Identity {
    Identity::encode_str(vector.policy_ref, vector.nonce).expect("vector inputs are valid")
}

/// Check every identity vector. Returns the names of failing vectors.
pub fn verify_identity_vectors() -> Vec<&'static str> {
    identity_vectors()
        .into_iter()
        .filter(|v| identity_from_vector(v).to_hex() != v.expected_identity)
        .map(|v| v.name)
        .collect()
}

/// A golden session-message vector.
#[derive(Debug, Clone)]
pub struct SessionVector {
    pub name: &'static str,
    pub package_id: PackageId,
    pub ttl_min: u16,
    pub created_at_ms: i64,
    /// Seed of the session key.
    pub session_seed: [u8; 32],
    /// Seed of the wallet key.
    pub wallet_seed: [u8; 32],
    pub expected_message: &'static str,
    /// Expected serialized wallet signature (hex).
    pub expected_signature: &'static str,
}

/// Get all session vectors.
pub fn session_vectors() -> Vec<SessionVector> {
    vec![SessionVector {
        name: "ten minute session at 2026-01-01",
        package_id: PackageId::from_bytes([0x44; 32]),
        ttl_min: 10,
        created_at_ms: 1_767_225_600_000,
        session_seed: [0x42; 32],
        wallet_seed: [0x07; 32],
        expected_message: "Accessing keys of package \
            0x4444444444444444444444444444444444444444444444444444444444444444 \
            for 10 mins from 2026-01-01 00:00:00 UTC, \
            session key IVL40Zt5HSRFMkLhXy6rbLfP+ntqXtMAl5YOBpiB2xI=",
        expected_signature: "005b02a0b9c0f15f69e1ee129406c9fe096acbf2ece18d776c987e78b8c3c9\
            2529d11fe509967bf69b83fbbaca5187c003cf9223ad0bcc18e18e64ae3c34b17e0d\
            ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c",
    }]
}

/// The message a vector's session asks the wallet to sign.
pub fn message_from_vector(vector: &SessionVector) -> String {
    let session_key = Keypair::from_seed(&vector.session_seed).public_key();
    String::from_utf8_lossy(&personal_message(
        &vector.package_id,
        vector.ttl_min,
        vector.created_at_ms,
        &session_key,
    ))
    .into_owned()
}
