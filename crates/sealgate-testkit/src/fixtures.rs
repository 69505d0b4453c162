//! Test fixtures and helpers.
//!
//! A [`TestCluster`] wires a [`MemoryLedger`], a set of [`LocalKeyServer`]s
//! and a [`FixedClock`] together, the way a deployment wires a full node,
//! key servers and wall time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use sealgate::{KeyServerConfig, SealClient, SealConfig};
use sealgate_core::{Address, Clock, FixedClock, Keypair, ObjectId, PackageId, PolicyRef};
use sealgate_transport::{
    KeyServer, KeypairWallet, LocalKeyServer, MemoryLedger, SignerError, WalletSigner,
};

/// 2026-01-01T00:00:00Z
pub const T0: i64 = 1_767_225_600_000;

/// Package every fixture deploys its policy under.
pub const TEST_PACKAGE: PackageId = PackageId::from_bytes([0x44; 32]);

/// Ledger, key servers and clock for end-to-end tests.
pub struct TestCluster {
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<FixedClock>,
    pub servers: Vec<Arc<LocalKeyServer>>,
    pub config: SealConfig,
}

impl TestCluster {
    /// `n` key servers of weight 1, any `threshold` of which can decrypt.
    pub async fn new(n: u8, threshold: u8) -> Self {
        let ledger = Arc::new(MemoryLedger::new(TEST_PACKAGE, "whitelist", "seal_approve"));
        let clock = Arc::new(FixedClock::new(T0));

        let mut servers = Vec::with_capacity(n as usize);
        for i in 1..=n {
            let server = Arc::new(LocalKeyServer::new(
                ObjectId::from_bytes([i; 32]),
                format!("ks-{i}"),
                TEST_PACKAGE,
                ledger.clone(),
                clock.clone(),
            ));
            ledger.register_key_server(server.descriptor()).await;
            servers.push(server);
        }

        let mut config = SealConfig::for_package(TEST_PACKAGE);
        config.threshold = threshold;
        config.request_timeout_ms = 2_000;
        config.key_servers = servers
            .iter()
            .map(|s| KeyServerConfig {
                object_id: s.object_id(),
                weight: 1,
            })
            .collect();

        Self {
            ledger,
            clock,
            servers,
            config,
        }
    }

    /// A client connected to every server in the cluster.
    pub fn client(&self) -> SealClient {
        self.client_with(self.config.clone())
    }

    /// A client with a custom configuration.
    pub fn client_with(&self, config: SealConfig) -> SealClient {
        let servers = self
            .servers
            .iter()
            .map(|s| s.clone() as Arc<dyn KeyServer>)
            .collect();
        SealClient::new(config, self.ledger.clone(), servers, self.clock.clone())
            .expect("fixture config is valid")
    }

    /// Create a whitelist holding `members`.
    pub async fn whitelist(&self, policy: &PolicyRef, members: &[Address]) {
        self.ledger.create_whitelist(policy.clone()).await;
        for member in members {
            self.ledger.add_to_whitelist(policy, *member).await;
        }
    }

    /// Take servers `0..count` offline.
    pub fn take_offline(&self, count: usize) {
        for server in self.servers.iter().take(count) {
            server.set_online(false);
        }
    }

    /// Fetch requests received across all servers.
    pub fn total_requests(&self) -> usize {
        self.servers.iter().map(|s| s.request_count()).sum()
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

/// A wallet with a deterministic key.
pub fn wallet(seed: u8) -> KeypairWallet {
    KeypairWallet::new(Keypair::from_seed(&[seed; 32]))
}

/// A whitelist reference that differs per `n`.
pub fn policy(n: u8) -> PolicyRef {
    PolicyRef::from_bytes(vec![0x5c, 0x1e, n]).expect("three bytes is a valid reference")
}

/// What a [`ScriptedSigner`] does when asked to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerScript {
    Sign,
    Reject,
    NoWallet,
    Fail,
    Empty,
}

/// A wallet whose answer is scripted. Counts how often it is asked.
pub struct ScriptedSigner {
    wallet: KeypairWallet,
    script: SignerScript,
    calls: AtomicUsize,
}

impl ScriptedSigner {
    pub fn new(wallet: KeypairWallet, script: SignerScript) -> Self {
        Self {
            wallet,
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for ScriptedSigner {
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            SignerScript::Sign => self.wallet.sign_personal_message(message).await,
            SignerScript::Reject => Err(SignerError::Rejected("user declined".into())),
            SignerScript::NoWallet => Err(SignerError::Unavailable("no wallet connected".into())),
            SignerScript::Fail => Err(SignerError::Failed("wallet crashed".into())),
            SignerScript::Empty => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cluster_setup() {
        let cluster = TestCluster::new(3, 2).await;
        assert_eq!(cluster.servers.len(), 3);
        assert_eq!(cluster.config.total_weight(), 3);
        assert!(cluster.config.validate().is_ok());
        assert_eq!(cluster.now(), T0);
    }

    #[tokio::test]
    async fn test_scripted_signer_counts() {
        let signer = ScriptedSigner::new(wallet(1), SignerScript::Reject);
        assert!(signer.sign_personal_message(b"m").await.is_err());
        assert_eq!(signer.calls(), 1);
    }
}
