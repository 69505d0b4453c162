//! Session creation.
//!
//! A session is authorized once, by the wallet, and then signs every key
//! request on its own until it expires. The manager keeps no state beyond
//! its settings: callers own the credentials it hands out.

use std::sync::Arc;
use std::time::Duration;

use sealgate_core::{Address, Clock, PackageId, SessionCredential, UnsignedSession};
use sealgate_transport::WalletSigner;

use crate::config::SealConfig;
use crate::error::{Result, SealError};

/// Factory for wallet-authorized session credentials.
#[derive(Clone)]
pub struct SessionManager {
    clock: Arc<dyn Clock>,
    ttl_min: u16,
    signing_timeout: Duration,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>, ttl_min: u16, signing_timeout: Duration) -> Self {
        Self {
            clock,
            ttl_min,
            signing_timeout,
        }
    }

    pub fn from_config(config: &SealConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, config.session_ttl_min, config.signing_timeout())
    }

    pub fn ttl_min(&self) -> u16 {
        self.ttl_min
    }

    /// Ask `signer` to authorize a new session for `address` on `package_id`.
    ///
    /// The signer is called exactly once. A refusal maps to
    /// [`SealError::AuthorizationDenied`]; a failure, an empty signature or
    /// no answer within the signing timeout maps to
    /// [`SealError::SigningFailed`].
    pub async fn create_session(
        &self,
        address: Address,
        package_id: PackageId,
        signer: &dyn WalletSigner,
    ) -> Result<SessionCredential> {
        let unsigned =
            UnsignedSession::new(address, package_id, self.ttl_min, self.clock.now_millis())?;
        let message = unsigned.personal_message();

        tracing::debug!(%address, package = %package_id, ttl_min = self.ttl_min, "requesting session signature");

        let signature =
            match tokio::time::timeout(self.signing_timeout, signer.sign_personal_message(&message))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SealError::SigningFailed(format!(
                        "no signature within {}ms",
                        self.signing_timeout.as_millis()
                    )))
                }
            };

        if signature.is_empty() {
            return Err(SealError::SigningFailed("signer returned an empty signature".into()));
        }

        let credential = unsigned
            .attach_signature(signature)
            .map_err(|e| SealError::SigningFailed(e.to_string()))?;

        tracing::info!(%address, expires_at_ms = credential.expires_at_ms(), "session created");
        Ok(credential)
    }

    /// Whether `credential` is still within its lifetime.
    pub fn is_active(&self, credential: &SessionCredential) -> bool {
        credential.is_active(self.clock.now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use sealgate_core::FixedClock;
    use sealgate_transport::{KeypairWallet, SignerError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const T0: i64 = 1_767_225_600_000;
    const PACKAGE: PackageId = PackageId::from_bytes([0x44; 32]);

    enum Behavior {
        Reject,
        Fail,
        Empty,
        Hang,
    }

    struct ScriptedSigner {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl ScriptedSigner {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WalletSigner for ScriptedSigner {
        async fn sign_personal_message(
            &self,
            _message: &[u8],
        ) -> std::result::Result<Vec<u8>, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Reject => Err(SignerError::Rejected("user declined".into())),
                Behavior::Fail => Err(SignerError::Failed("wallet crashed".into())),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(vec![1])
                }
            }
        }
    }

    fn manager(clock: Arc<FixedClock>) -> SessionManager {
        SessionManager::new(clock, 10, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_session_lifetime() {
        let clock = Arc::new(FixedClock::new(T0));
        let manager = manager(clock.clone());
        let wallet = KeypairWallet::generate();

        let credential = manager
            .create_session(wallet.address(), PACKAGE, &wallet)
            .await
            .unwrap();
        assert_eq!(credential.created_at_ms(), T0);
        assert_eq!(credential.address(), &wallet.address());

        clock.set(T0 + 9 * 60_000 + 59_000);
        assert!(manager.is_active(&credential));

        clock.set(T0 + 10 * 60_000 + 1_000);
        assert!(!manager.is_active(&credential));
    }

    #[tokio::test]
    async fn test_signer_rejection() {
        let signer = ScriptedSigner::new(Behavior::Reject);
        let err = manager(Arc::new(FixedClock::new(T0)))
            .create_session(Address::ZERO, PACKAGE, &signer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signer_failure_and_empty() {
        let failing = ScriptedSigner::new(Behavior::Fail);
        let err = manager(Arc::new(FixedClock::new(T0)))
            .create_session(Address::ZERO, PACKAGE, &failing)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailed);

        let empty = ScriptedSigner::new(Behavior::Empty);
        let err = manager(Arc::new(FixedClock::new(T0)))
            .create_session(Address::ZERO, PACKAGE, &empty)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailed);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signing_timeout() {
        let signer = ScriptedSigner::new(Behavior::Hang);
        let err = manager(Arc::new(FixedClock::new(T0)))
            .create_session(Address::ZERO, PACKAGE, &signer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailed);
    }

    #[tokio::test]
    async fn test_invalid_ttl() {
        let manager = SessionManager::new(
            Arc::new(FixedClock::new(T0)),
            0,
            Duration::from_secs(1),
        );
        let wallet = KeypairWallet::generate();
        let err = manager
            .create_session(wallet.address(), PACKAGE, &wallet)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
