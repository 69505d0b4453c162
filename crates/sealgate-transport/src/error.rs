//! Error types for collaborator calls.

use thiserror::Error;

/// Errors returned by ledger clients and key servers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote party could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// No answer within the allotted time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The remote party evaluated the request and refused it.
    #[error("denied: {0}")]
    Denied(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or failed verification.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Message (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Whether the failure says nothing about authorization.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Unreachable(_) | TransportError::Timeout(_))
    }
}

/// Errors returned by a wallet asked to sign.
#[derive(Debug, Error)]
pub enum SignerError {
    /// No signing capability is connected.
    #[error("no signer available: {0}")]
    Unavailable(String),

    /// The user declined to sign.
    #[error("signature rejected: {0}")]
    Rejected(String),

    /// The signing call itself failed.
    #[error("signing failed: {0}")]
    Failed(String),
}

/// Result type for collaborator calls.
pub type Result<T> = std::result::Result<T, TransportError>;
