//! Error types for sealgate core.

use thiserror::Error;

/// Errors raised by the pure identity and credential primitives.
///
/// None of these involve I/O; they are all detected locally before any
/// collaborator is contacted.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("malformed nonce: {0}")]
    MalformedNonce(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
