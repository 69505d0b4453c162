//! Key-server abstraction.
//!
//! A key server holds a master secret and releases per-identity key
//! material only when the policy predicate approves the requester. Clients
//! talk to a fixed set of servers and need `threshold` of them to agree.

use async_trait::async_trait;

use sealgate_core::ObjectId;

use crate::error::Result;
use crate::messages::{FetchKeyRequest, FetchKeyResponse};

/// One member of the key-server cluster.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait KeyServer: Send + Sync {
    /// The server's on-ledger object id.
    fn object_id(&self) -> ObjectId;

    /// Ask for the wrap keys of the request's ciphertext.
    ///
    /// Returns [`TransportError::Denied`](crate::TransportError::Denied) when
    /// the policy predicate rejects the requester.
    async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse>;
}

/// A key server running in-process, for testing.
///
/// Performs the checks a real server performs: certificate freshness and
/// signature, request signature, policy simulation on the ledger.
pub mod local {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use sealgate_core::{Clock, PackageId};
    use sealgate_threshold::{EncryptedObject, SealedKey, X25519StaticSecret};

    use crate::error::TransportError;
    use crate::ledger::LedgerClient;
    use crate::messages::{KeyServerDescriptor, PROTOCOL_VERSION};
    use crate::policy::PolicyCall;
    use crate::wallet::verify_personal_message;

    /// In-process key server.
    pub struct LocalKeyServer {
        object_id: ObjectId,
        name: String,
        secret: X25519StaticSecret,
        package: PackageId,
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        online: AtomicBool,
        delay_ms: AtomicU64,
        requests: AtomicUsize,
    }

    impl LocalKeyServer {
        /// Create a server with a fresh master secret.
        pub fn new(
            object_id: ObjectId,
            name: impl Into<String>,
            package: PackageId,
            ledger: Arc<dyn LedgerClient>,
            clock: Arc<dyn Clock>,
        ) -> Self {
            Self {
                object_id,
                name: name.into(),
                secret: X25519StaticSecret::generate(),
                package,
                ledger,
                clock,
                online: AtomicBool::new(true),
                delay_ms: AtomicU64::new(0),
                requests: AtomicUsize::new(0),
            }
        }

        /// The descriptor to publish on the ledger.
        pub fn descriptor(&self) -> KeyServerDescriptor {
            KeyServerDescriptor {
                object_id: self.object_id,
                name: self.name.clone(),
                url: format!("memory://{}", self.name),
                public_key: self.secret.public_key(),
            }
        }

        /// Simulate an outage.
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        /// Delay every answer.
        pub fn set_delay(&self, delay: Duration) {
            self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        }

        /// Number of fetch requests received.
        pub fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        fn verify_request(&self, request: &FetchKeyRequest) -> Result<EncryptedObject> {
            request.check_limits()?;
            if request.protocol_version != PROTOCOL_VERSION {
                return Err(TransportError::InvalidRequest(format!(
                    "unsupported protocol version {}",
                    request.protocol_version
                )));
            }

            let cert = &request.certificate;
            if cert.package_id != self.package {
                return Err(TransportError::InvalidRequest(
                    "certificate issued for another package".into(),
                ));
            }
            if !cert.is_active(self.clock.now_millis()) {
                return Err(TransportError::InvalidRequest("certificate expired".into()));
            }
            verify_personal_message(&cert.signature, &cert.personal_message(), &cert.user)?;
            cert.session_key
                .verify(&request.own_signing_bytes()?, &request.request_signature)
                .map_err(|e| TransportError::InvalidRequest(format!("request signature: {e}")))?;

            let object = EncryptedObject::from_bytes(&request.ciphertext)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            if object.package_id != self.package {
                return Err(TransportError::InvalidRequest(
                    "ciphertext bound to another package".into(),
                ));
            }
            Ok(object)
        }
    }

    #[async_trait]
    impl KeyServer for LocalKeyServer {
        fn object_id(&self) -> ObjectId {
            self.object_id
        }

        async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse> {
            self.requests.fetch_add(1, Ordering::SeqCst);

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if !self.online.load(Ordering::SeqCst) {
                return Err(TransportError::Unreachable(format!("{} offline", self.name)));
            }

            let object = self.verify_request(request)?;
            let call = PolicyCall::from_tx_kind_bytes(&request.policy_call)?;
            if call.id_arg() != Some(object.id.as_bytes()) {
                return Err(TransportError::Denied(
                    "policy call id does not match ciphertext".into(),
                ));
            }

            let user = request.certificate.user;
            let approved = match self.ledger.dry_run(&user, &request.policy_call).await {
                Ok(approved) => approved,
                Err(TransportError::NotFound(what)) => {
                    return Err(TransportError::Denied(format!("{what} not found")))
                }
                Err(e) => return Err(e),
            };
            if !approved {
                tracing::debug!(server = %self.name, %user, "policy rejected request");
                return Err(TransportError::Denied(format!(
                    "{} rejected {user}",
                    call.target()
                )));
            }

            let full_id = object.full_identity();
            let keys = object
                .shares_for(&self.object_id)
                .map(|sealed| {
                    let wrap_key = sealed.derive_wrap_key(&self.secret, &full_id);
                    SealedKey::seal(sealed.index, &wrap_key, &request.response_key, &full_id)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

            if keys.is_empty() {
                return Err(TransportError::InvalidRequest(
                    "ciphertext holds no share for this server".into(),
                ));
            }

            tracing::debug!(server = %self.name, shares = keys.len(), "released keys");
            Ok(FetchKeyResponse {
                server: self.object_id,
                keys,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::local::LocalKeyServer;
    use super::*;
    use crate::error::TransportError;
    use crate::ledger::memory::MemoryLedger;
    use crate::messages::PROTOCOL_VERSION;
    use crate::policy::PolicyCall;
    use crate::wallet::{KeypairWallet, WalletSigner};
    use bytes::Bytes;
    use sealgate_core::{
        Clock, FixedClock, Identity, Nonce, PackageId, PolicyRef, SessionCredential,
        UnsignedSession,
    };
    use sealgate_threshold::{EncryptedObject, ServerKey, Share, X25519StaticSecret};
    use std::sync::Arc;

    const PACKAGE: PackageId = PackageId::from_bytes([0x44; 32]);
    const T0: i64 = 1_767_225_600_000;

    struct World {
        ledger: Arc<MemoryLedger>,
        clock: Arc<FixedClock>,
        server: LocalKeyServer,
        wallet: KeypairWallet,
        policy: PolicyRef,
    }

    async fn world() -> World {
        let ledger = Arc::new(MemoryLedger::new(PACKAGE, "whitelist", "seal_approve"));
        let clock = Arc::new(FixedClock::new(T0));
        let server = LocalKeyServer::new(
            ObjectId::from_bytes([1; 32]),
            "ks-1",
            PACKAGE,
            ledger.clone(),
            clock.clone(),
        );
        ledger.register_key_server(server.descriptor()).await;
        let wallet = KeypairWallet::generate();
        let policy = PolicyRef::parse("0xabc123").unwrap();
        ledger.add_to_whitelist(&policy, wallet.address()).await;
        World {
            ledger,
            clock,
            server,
            wallet,
            policy,
        }
    }

    async fn credential(world: &World) -> SessionCredential {
        let unsigned =
            UnsignedSession::new(world.wallet.address(), PACKAGE, 10, world.clock.now_millis())
                .unwrap();
        let sig = world
            .wallet
            .sign_personal_message(&unsigned.personal_message())
            .await
            .unwrap();
        unsigned.attach_signature(sig).unwrap()
    }

    fn encrypt(world: &World, nonce: &str) -> EncryptedObject {
        let id = Identity::encode(&world.policy, &Nonce::from_text(nonce).unwrap());
        let descriptor = world.server.descriptor();
        let servers = [ServerKey {
            object_id: descriptor.object_id,
            public_key: descriptor.public_key,
            weight: 1,
        }];
        EncryptedObject::seal(PACKAGE, id, 1, &servers, b"secret").unwrap().0
    }

    fn request(
        cred: &SessionCredential,
        object: &EncryptedObject,
        response: &X25519StaticSecret,
    ) -> FetchKeyRequest {
        let ciphertext = Bytes::from(object.to_bytes().unwrap());
        let call = PolicyCall::approve(PACKAGE, "whitelist", "seal_approve", &object.id, &PolicyRef::parse("0xabc123").unwrap())
            .to_tx_kind_bytes()
            .unwrap();
        let response_key = response.public_key();
        let signing = FetchKeyRequest::signing_bytes(&ciphertext, &call, &response_key).unwrap();
        FetchKeyRequest {
            protocol_version: PROTOCOL_VERSION,
            ciphertext,
            policy_call: call,
            response_key,
            certificate: cred.certificate(),
            request_signature: cred.sign_request(&signing),
        }
    }

    #[tokio::test]
    async fn test_whitelisted_user_gets_key() {
        let world = world().await;
        let cred = credential(&world).await;
        let object = encrypt(&world, "n1");
        let response = X25519StaticSecret::generate();

        let answer = world
            .server
            .fetch_key(&request(&cred, &object, &response))
            .await
            .unwrap();
        assert_eq!(answer.server, world.server.object_id());
        assert_eq!(answer.keys.len(), 1);

        let full_id = object.full_identity();
        let shares: Vec<Share> = answer
            .keys
            .iter()
            .map(|k| {
                let wrap = k.open(&response, &full_id).unwrap();
                object.shares[0].open(&wrap, &full_id).unwrap()
            })
            .collect();
        assert_eq!(object.open_with_shares(&shares).unwrap(), b"secret");
        assert_eq!(world.ledger.dry_run_count(), 1);
    }

    #[tokio::test]
    async fn test_removed_user_is_denied() {
        let world = world().await;
        let cred = credential(&world).await;
        world
            .ledger
            .remove_from_whitelist(&world.policy, &world.wallet.address())
            .await;

        let object = encrypt(&world, "n1");
        let err = world
            .server
            .fetch_key(&request(&cred, &object, &X25519StaticSecret::generate()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Denied(_)));
    }

    #[tokio::test]
    async fn test_expired_certificate_rejected() {
        let world = world().await;
        let cred = credential(&world).await;
        world.clock.advance(10 * 60_000);

        let object = encrypt(&world, "n1");
        let err = world
            .server
            .fetch_key(&request(&cred, &object, &X25519StaticSecret::generate()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
        assert_eq!(world.ledger.dry_run_count(), 0);
    }

    #[tokio::test]
    async fn test_tampered_request_rejected() {
        let world = world().await;
        let cred = credential(&world).await;
        let object = encrypt(&world, "n1");
        let mut req = request(&cred, &object, &X25519StaticSecret::generate());
        // redirect the answer to another key
        req.response_key = X25519StaticSecret::generate().public_key();

        let err = world.server.fetch_key(&req).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_offline_server_unreachable() {
        let world = world().await;
        let cred = credential(&world).await;
        let object = encrypt(&world, "n1");
        world.server.set_online(false);

        let err = world
            .server
            .fetch_key(&request(&cred, &object, &X25519StaticSecret::generate()))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(world.server.request_count(), 1);
    }
}
