//! Error types for sealgate.
//!
//! Every failure a caller can see is one of the [`SealError`] variants.
//! Lower-layer errors convert into it, so callers only ever match on this
//! closed set.

use thiserror::Error;

use sealgate_core::CoreError;
use sealgate_threshold::ThresholdError;
use sealgate_transport::{SignerError, TransportError};

/// Errors that can occur during sealgate operations.
#[derive(Debug, Error)]
pub enum SealError {
    /// A policy reference, address or nonce could not be parsed.
    #[error("malformed reference: {0}")]
    MalformedReference(String),

    /// The user or wallet refused to authorize a session.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The signing capability failed or timed out.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The session credential is past its lifetime.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The session credential is scoped to another package.
    #[error("session mismatch: {0}")]
    SessionMismatch(String),

    /// The policy denied access, or the identity does not match the ciphertext.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Not enough key servers could be resolved to encrypt.
    #[error("encryption service unavailable: {0}")]
    EncryptionServiceUnavailable(String),

    /// Too few key servers answered to decrypt.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed ciphertext, oversized input or bad configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Discriminant of a [`SealError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedReference,
    AuthorizationDenied,
    SigningFailed,
    SessionExpired,
    SessionMismatch,
    AccessDenied,
    EncryptionServiceUnavailable,
    ServiceUnavailable,
    InvalidInput,
}

impl SealError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SealError::MalformedReference(_) => ErrorKind::MalformedReference,
            SealError::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            SealError::SigningFailed(_) => ErrorKind::SigningFailed,
            SealError::SessionExpired(_) => ErrorKind::SessionExpired,
            SealError::SessionMismatch(_) => ErrorKind::SessionMismatch,
            SealError::AccessDenied(_) => ErrorKind::AccessDenied,
            SealError::EncryptionServiceUnavailable(_) => ErrorKind::EncryptionServiceUnavailable,
            SealError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            SealError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Human-readable detail.
    pub fn detail(&self) -> &str {
        match self {
            SealError::MalformedReference(s)
            | SealError::AuthorizationDenied(s)
            | SealError::SigningFailed(s)
            | SealError::SessionExpired(s)
            | SealError::SessionMismatch(s)
            | SealError::AccessDenied(s)
            | SealError::EncryptionServiceUnavailable(s)
            | SealError::ServiceUnavailable(s)
            | SealError::InvalidInput(s) => s,
        }
    }

    /// The caller is not (or no longer) authorized. Retrying with the same
    /// credential will not help.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            SealError::AuthorizationDenied(_)
                | SealError::SessionExpired(_)
                | SealError::SessionMismatch(_)
                | SealError::AccessDenied(_)
        )
    }

    /// The failure was transient; retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SealError::EncryptionServiceUnavailable(_) | SealError::ServiceUnavailable(_)
        )
    }
}

impl From<CoreError> for SealError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedReference(_) | CoreError::MalformedNonce(_) => {
                SealError::MalformedReference(err.to_string())
            }
            CoreError::InvalidSession(_)
            | CoreError::InvalidSignature
            | CoreError::InvalidPublicKey
            | CoreError::EncodingError(_)
            | CoreError::DecodingError(_) => SealError::InvalidInput(err.to_string()),
        }
    }
}

impl From<ThresholdError> for SealError {
    fn from(err: ThresholdError) -> Self {
        match err {
            ThresholdError::InsufficientShares { .. } => SealError::AccessDenied(err.to_string()),
            _ => SealError::InvalidInput(err.to_string()),
        }
    }
}

impl From<TransportError> for SealError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(_) | TransportError::Timeout(_) => {
                SealError::ServiceUnavailable(err.to_string())
            }
            TransportError::Denied(_) => SealError::AccessDenied(err.to_string()),
            TransportError::NotFound(_)
            | TransportError::InvalidRequest(_)
            | TransportError::Serialization(_) => SealError::InvalidInput(err.to_string()),
        }
    }
}

impl From<SignerError> for SealError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Unavailable(_) | SignerError::Rejected(_) => {
                SealError::AuthorizationDenied(err.to_string())
            }
            SignerError::Failed(_) => SealError::SigningFailed(err.to_string()),
        }
    }
}

/// Result type for sealgate operations.
pub type Result<T> = std::result::Result<T, SealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_errors() {
        let denied: SealError = SignerError::Rejected("user closed prompt".into()).into();
        assert_eq!(denied.kind(), ErrorKind::AuthorizationDenied);
        assert!(denied.is_authorization());

        let none: SealError = SignerError::Unavailable("no wallet".into()).into();
        assert_eq!(none.kind(), ErrorKind::AuthorizationDenied);

        let failed: SealError = SignerError::Failed("rpc".into()).into();
        assert_eq!(failed.kind(), ErrorKind::SigningFailed);
        assert!(!failed.is_authorization());
    }

    #[test]
    fn test_transport_errors() {
        let down: SealError = TransportError::Unreachable("ks-1".into()).into();
        assert_eq!(down.kind(), ErrorKind::ServiceUnavailable);
        assert!(down.is_unavailable());

        let slow: SealError = TransportError::Timeout("ks-1".into()).into();
        assert!(slow.is_unavailable());

        let denied: SealError = TransportError::Denied("not listed".into()).into();
        assert_eq!(denied.kind(), ErrorKind::AccessDenied);
        assert!(!denied.is_unavailable());
    }

    #[test]
    fn test_core_errors() {
        let bad: SealError = CoreError::MalformedReference("0xzz".into()).into();
        assert_eq!(bad.kind(), ErrorKind::MalformedReference);
        assert!(bad.detail().contains("0xzz"));

        let nonce: SealError = CoreError::MalformedNonce("empty".into()).into();
        assert_eq!(nonce.kind(), ErrorKind::MalformedReference);
    }

    #[test]
    fn test_threshold_errors() {
        let short: SealError = ThresholdError::InsufficientShares { needed: 2, have: 1 }.into();
        assert_eq!(short.kind(), ErrorKind::AccessDenied);

        let malformed: SealError = ThresholdError::MalformedCiphertext("eof".into()).into();
        assert_eq!(malformed.kind(), ErrorKind::InvalidInput);
    }
}
