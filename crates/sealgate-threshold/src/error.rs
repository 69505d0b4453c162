//! Error types for the threshold module.

use thiserror::Error;

/// Errors that can occur while sealing or opening threshold ciphertexts.
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// Threshold or share parameters are unusable.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Not enough distinct shares to reconstruct the key.
    #[error("insufficient shares: need {needed}, have {have}")]
    InsufficientShares { needed: usize, have: usize },

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Ciphertext is not a supported encrypted object.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for threshold operations.
pub type Result<T> = std::result::Result<T, ThresholdError>;
