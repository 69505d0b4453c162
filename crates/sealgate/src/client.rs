//! The sealgate client: encryption and decryption orchestration.
//!
//! The client owns no keys. Encryption needs only the key servers' public
//! keys; decryption needs a live session credential and the cooperation of
//! `threshold` key servers, each of which checks the policy on the ledger
//! before answering.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::instrument;

use sealgate_core::{
    Address, Clock, Identity, Nonce, ObjectId, PackageId, PolicyRef, SessionCredential,
};
use sealgate_threshold::{
    BackupKey, EncryptedObject, ServerKey, Share, X25519StaticSecret,
};
use sealgate_transport::{
    FetchKeyRequest, FetchKeyResponse, KeyServer, LedgerClient, PolicyCall, TransportError,
    WalletSigner, PROTOCOL_VERSION,
};

use crate::config::SealConfig;
use crate::error::{Result, SealError};
use crate::record::EncryptedRecord;
use crate::session::SessionManager;

/// Identity-based encryption client bound to one policy package.
///
/// Cheap to share: wrap it in an `Arc` and call it from many tasks.
pub struct SealClient {
    config: SealConfig,
    ledger: Arc<dyn LedgerClient>,
    key_servers: HashMap<ObjectId, Arc<dyn KeyServer>>,
    clock: Arc<dyn Clock>,
    sessions: SessionManager,
}

/// Outcome of one key server's answer.
enum Answer {
    Shares(Vec<Share>),
    Denied,
    Unavailable,
    Invalid,
}

impl SealClient {
    /// Create a client. Fails if `config` does not validate.
    pub fn new(
        config: SealConfig,
        ledger: Arc<dyn LedgerClient>,
        key_servers: Vec<Arc<dyn KeyServer>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let sessions = SessionManager::from_config(&config, clock.clone());
        let key_servers = key_servers
            .into_iter()
            .map(|server| (server.object_id(), server))
            .collect();

        Ok(Self {
            config,
            ledger,
            key_servers,
            clock,
            sessions,
        })
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    pub fn package_id(&self) -> PackageId {
        self.config.package_id
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the wallet to authorize a session for this client's package.
    pub async fn create_session(
        &self,
        address: Address,
        signer: &dyn WalletSigner,
    ) -> Result<SessionCredential> {
        self.sessions
            .create_session(address, self.config.package_id, signer)
            .await
    }

    /// Whether `credential` is still within its lifetime.
    pub fn is_active(&self, credential: &SessionCredential) -> bool {
        self.sessions.is_active(credential)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `plaintext` for whoever satisfies `policy`.
    ///
    /// Returns the ciphertext and the backup key. The backup key decrypts the
    /// ciphertext without the key servers; keep it private.
    #[instrument(skip_all, fields(policy = %policy, len = plaintext.len()))]
    pub async fn encrypt(
        &self,
        policy: &PolicyRef,
        nonce: &Nonce,
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, BackupKey)> {
        if plaintext.len() > self.config.max_plaintext_bytes {
            return Err(SealError::InvalidInput(format!(
                "plaintext of {} bytes exceeds limit of {}",
                plaintext.len(),
                self.config.max_plaintext_bytes
            )));
        }

        let id = Identity::encode(policy, nonce);
        let servers = self.resolve_key_servers().await;
        let available: usize = servers.iter().map(|s| s.weight as usize).sum();
        if available < self.config.threshold as usize {
            return Err(SealError::EncryptionServiceUnavailable(format!(
                "resolved key server weight {available} is below threshold {}",
                self.config.threshold
            )));
        }

        let (object, backup) = EncryptedObject::seal(
            self.config.package_id,
            id,
            self.config.threshold,
            &servers,
            plaintext,
        )?;
        let bytes = object.to_bytes()?;

        tracing::debug!(
            servers = servers.len(),
            threshold = self.config.threshold,
            ciphertext_len = bytes.len(),
            "encrypted"
        );
        Ok((bytes, backup))
    }

    /// Encrypt and package the result with its parameters.
    pub async fn encrypt_record(
        &self,
        policy: &PolicyRef,
        nonce: &Nonce,
        plaintext: &[u8],
        metadata: serde_json::Value,
    ) -> Result<EncryptedRecord> {
        let (ciphertext, backup) = self.encrypt(policy, nonce, plaintext).await?;
        Ok(EncryptedRecord {
            ciphertext,
            backup_key: backup,
            policy_ref: policy.clone(),
            nonce: nonce.as_bytes().to_vec(),
            metadata,
            created_at_ms: self.clock.now_millis(),
        })
    }

    /// Look up the configured key servers on the ledger.
    ///
    /// Servers that cannot be resolved are skipped.
    async fn resolve_key_servers(&self) -> Vec<ServerKey> {
        let lookups = self.config.key_servers.iter().map(|entry| async move {
            (entry, self.ledger.key_server(&entry.object_id).await)
        });

        let mut servers = Vec::with_capacity(self.config.key_servers.len());
        for (entry, result) in futures::future::join_all(lookups).await {
            match result {
                Ok(descriptor) if descriptor.object_id == entry.object_id => {
                    servers.push(ServerKey {
                        object_id: entry.object_id,
                        public_key: descriptor.public_key,
                        weight: entry.weight,
                    });
                }
                Ok(descriptor) => {
                    tracing::warn!(
                        expected = %entry.object_id,
                        got = %descriptor.object_id,
                        "ledger returned descriptor for another key server"
                    );
                }
                Err(e) => {
                    tracing::warn!(server = %entry.object_id, "key server lookup failed: {}", e);
                }
            }
        }
        servers
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt `ciphertext` with the help of the key servers.
    ///
    /// Local checks run first and fail without any network traffic: an
    /// expired or foreign credential, a malformed ciphertext, or a
    /// `(policy, nonce)` pair that does not match the ciphertext's identity.
    /// Then every key server named in the ciphertext is asked concurrently,
    /// and the plaintext is assembled as soon as `threshold` shares arrive.
    ///
    /// When too few shares come back, the error is
    /// [`SealError::ServiceUnavailable`] if fewer than `threshold` servers
    /// answered at all, and [`SealError::AccessDenied`] otherwise.
    #[instrument(skip_all, fields(policy = %policy, user = %credential.address()))]
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        credential: &SessionCredential,
        policy: &PolicyRef,
        nonce: &Nonce,
    ) -> Result<Vec<u8>> {
        let now = self.clock.now_millis();
        if !credential.is_active(now) {
            return Err(SealError::SessionExpired(format!(
                "session expired at {}",
                credential.expires_at_ms()
            )));
        }
        if credential.package_id() != &self.config.package_id {
            return Err(SealError::SessionMismatch(format!(
                "session is scoped to package {}, client uses {}",
                credential.package_id(),
                self.config.package_id
            )));
        }

        let object = EncryptedObject::from_bytes(ciphertext)?;
        if &object.package_id != credential.package_id() {
            return Err(SealError::SessionMismatch(format!(
                "ciphertext is bound to package {}",
                object.package_id
            )));
        }
        if Identity::encode(policy, nonce) != object.id {
            return Err(SealError::AccessDenied(
                "policy reference and nonce do not match the ciphertext".into(),
            ));
        }

        let policy_call = PolicyCall::approve(
            self.config.package_id,
            self.config.policy_module.clone(),
            self.config.policy_function.clone(),
            &object.id,
            policy,
        )
        .to_tx_kind_bytes()?;

        let response_secret = X25519StaticSecret::generate();
        let response_key = response_secret.public_key();
        let ciphertext = Bytes::copy_from_slice(ciphertext);
        let signing = FetchKeyRequest::signing_bytes(&ciphertext, &policy_call, &response_key)?;
        let request = FetchKeyRequest {
            protocol_version: PROTOCOL_VERSION,
            ciphertext,
            policy_call,
            response_key,
            certificate: credential.certificate(),
            request_signature: credential.sign_request(&signing),
        };

        let shares = self
            .gather_shares(&object, &request, &response_secret)
            .await?;
        let plaintext = object.open_with_shares(&shares)?;

        tracing::debug!(shares = shares.len(), "decrypted");
        Ok(plaintext)
    }

    /// Fan the request out and collect at least `threshold` shares.
    async fn gather_shares(
        &self,
        object: &EncryptedObject,
        request: &FetchKeyRequest,
        response_secret: &X25519StaticSecret,
    ) -> Result<Vec<Share>> {
        let threshold = object.threshold as usize;
        let mut pending = FuturesUnordered::new();
        for server_id in object.servers() {
            match self.key_servers.get(&server_id) {
                Some(server) => pending.push(async move {
                    (server_id, server.fetch_key(request).await)
                }),
                None => tracing::warn!(server = %server_id, "no connection to key server"),
            }
        }

        let mut shares: Vec<Share> = Vec::with_capacity(threshold);
        let mut answered = 0usize;
        let mut denied = 0usize;
        let deadline = tokio::time::Instant::now() + self.config.request_timeout();

        while shares.len() < threshold {
            let (server_id, result) = match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        outstanding = pending.len(),
                        "key servers did not answer within {}ms",
                        self.config.request_timeout_ms
                    );
                    break;
                }
            };

            let weight = object.weight_of(&server_id);
            match self.read_answer(object, server_id, result, response_secret) {
                Answer::Shares(new) => {
                    answered += weight;
                    for share in new {
                        if !shares.iter().any(|s| s.index == share.index) {
                            shares.push(share);
                        }
                    }
                }
                Answer::Denied => {
                    answered += weight;
                    denied += weight;
                }
                Answer::Invalid => answered += weight,
                Answer::Unavailable => {}
            }
        }

        if shares.len() >= threshold {
            return Ok(shares);
        }
        if answered < threshold {
            return Err(SealError::ServiceUnavailable(format!(
                "key servers holding {answered} shares answered, {threshold} needed"
            )));
        }
        Err(SealError::AccessDenied(format!(
            "key servers holding {denied} shares denied the request, {} released",
            shares.len()
        )))
    }

    /// Open the wrap keys in one server's answer.
    fn read_answer(
        &self,
        object: &EncryptedObject,
        server_id: ObjectId,
        result: std::result::Result<FetchKeyResponse, TransportError>,
        response_secret: &X25519StaticSecret,
    ) -> Answer {
        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_unavailable() => {
                tracing::warn!(server = %server_id, "key server unavailable: {}", e);
                return Answer::Unavailable;
            }
            Err(TransportError::Denied(reason)) => {
                tracing::debug!(server = %server_id, %reason, "key server denied access");
                return Answer::Denied;
            }
            Err(e) => {
                tracing::warn!(server = %server_id, "key server rejected request: {}", e);
                return Answer::Invalid;
            }
        };

        if response.server != server_id {
            tracing::warn!(server = %server_id, "answer signed for another server");
            return Answer::Invalid;
        }

        let full_id = object.full_identity();
        let mut shares = Vec::with_capacity(response.keys.len());
        for key in &response.keys {
            let Some(sealed) = object
                .shares_for(&server_id)
                .find(|s| s.index == key.index)
            else {
                tracing::warn!(server = %server_id, index = key.index, "key for unknown share");
                return Answer::Invalid;
            };
            let opened = key
                .open(response_secret, &full_id)
                .and_then(|wrap_key| sealed.open(&wrap_key, &full_id));
            match opened {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(server = %server_id, index = key.index, "share did not open: {}", e);
                    return Answer::Invalid;
                }
            }
        }
        Answer::Shares(shares)
    }

    /// Decrypt locally with the backup key returned by [`SealClient::encrypt`].
    pub fn decrypt_with_backup(&self, ciphertext: &[u8], backup: &BackupKey) -> Result<Vec<u8>> {
        let object = EncryptedObject::from_bytes(ciphertext)?;
        object
            .open_with_backup(backup)
            .map_err(|e| SealError::InvalidInput(format!("backup key does not open ciphertext: {e}")))
    }
}
