//! Ledger client abstraction.
//!
//! The ledger stores policy objects and key-server descriptors and can
//! simulate a call without executing it. sealgate only reads from it.

use async_trait::async_trait;

use sealgate_core::{Address, ObjectId};

use crate::error::Result;
use crate::messages::KeyServerDescriptor;

/// Read-only view of the ledger.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the descriptor object of a key server.
    async fn key_server(&self, object_id: &ObjectId) -> Result<KeyServerDescriptor>;

    /// Simulate a transaction kind as `sender`.
    ///
    /// Returns whether the call completes without aborting. Nothing is
    /// committed.
    async fn dry_run(&self, sender: &Address, tx_kind: &[u8]) -> Result<bool>;
}

/// An in-memory ledger for testing.
///
/// Holds key-server descriptors and whitelist objects, and evaluates the
/// whitelist predicate the way the on-ledger module does: the sender must be
/// listed and the `id` argument must start with the whitelist's bytes.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    use sealgate_core::{PackageId, PolicyRef};

    use crate::error::TransportError;
    use crate::policy::PolicyCall;

    /// In-memory ledger implementation.
    pub struct MemoryLedger {
        package: PackageId,
        module: String,
        function: String,
        key_servers: RwLock<HashMap<ObjectId, KeyServerDescriptor>>,
        whitelists: RwLock<HashMap<PolicyRef, HashSet<Address>>>,
        offline: AtomicBool,
        dry_runs: AtomicUsize,
    }

    impl MemoryLedger {
        /// A ledger whose only predicate is `{package}::{module}::{function}`.
        pub fn new(
            package: PackageId,
            module: impl Into<String>,
            function: impl Into<String>,
        ) -> Self {
            Self {
                package,
                module: module.into(),
                function: function.into(),
                key_servers: RwLock::new(HashMap::new()),
                whitelists: RwLock::new(HashMap::new()),
                offline: AtomicBool::new(false),
                dry_runs: AtomicUsize::new(0),
            }
        }

        /// Publish a key-server descriptor.
        pub async fn register_key_server(&self, descriptor: KeyServerDescriptor) {
            self.key_servers
                .write()
                .await
                .insert(descriptor.object_id, descriptor);
        }

        /// Create an empty whitelist object.
        pub async fn create_whitelist(&self, policy: PolicyRef) {
            self.whitelists.write().await.entry(policy).or_default();
        }

        /// Add an address to a whitelist, creating it if needed.
        pub async fn add_to_whitelist(&self, policy: &PolicyRef, address: Address) {
            self.whitelists
                .write()
                .await
                .entry(policy.clone())
                .or_default()
                .insert(address);
        }

        /// Remove an address from a whitelist.
        pub async fn remove_from_whitelist(&self, policy: &PolicyRef, address: &Address) {
            if let Some(list) = self.whitelists.write().await.get_mut(policy) {
                list.remove(address);
            }
        }

        /// Simulate an outage.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Number of simulations served so far.
        pub fn dry_run_count(&self) -> usize {
            self.dry_runs.load(Ordering::SeqCst)
        }

        fn check_online(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(TransportError::Unreachable("ledger offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerClient for MemoryLedger {
        async fn key_server(&self, object_id: &ObjectId) -> Result<KeyServerDescriptor> {
            self.check_online()?;
            self.key_servers
                .read()
                .await
                .get(object_id)
                .cloned()
                .ok_or_else(|| TransportError::NotFound(format!("key server {object_id}")))
        }

        async fn dry_run(&self, sender: &Address, tx_kind: &[u8]) -> Result<bool> {
            self.check_online()?;
            self.dry_runs.fetch_add(1, Ordering::SeqCst);

            let call = PolicyCall::from_tx_kind_bytes(tx_kind)?;
            if call.package != self.package
                || call.module != self.module
                || call.function != self.function
            {
                return Err(TransportError::NotFound(format!("function {}", call.target())));
            }

            let (id, policy) = match (call.id_arg(), call.policy_arg()) {
                (Some(id), Some(policy)) => (id, policy),
                _ => return Ok(false),
            };

            let whitelists = self.whitelists.read().await;
            let Some(list) = whitelists.get(policy) else {
                return Err(TransportError::NotFound(format!("whitelist {policy}")));
            };

            Ok(id.starts_with(policy.as_bytes()) && list.contains(sender))
        }
    }
}
