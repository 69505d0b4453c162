//! # sealgate
//!
//! Identity-based encryption with on-ledger access control.
//!
//! ## Overview
//!
//! Data is encrypted under an identity built from a whitelist object and a
//! nonce. Decrypting it takes two things:
//!
//! - **A session**: a short-lived key authorized once by the user's wallet
//! - **Approval**: `threshold` key servers each simulate the whitelist's
//!   `seal_approve` predicate with the session's address as sender, and
//!   release their key material only if it passes
//!
//! Nothing is cached: every decryption asks the servers again, so removing
//! an address from the whitelist takes effect on the next request.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sealgate::{Nonce, PolicyRef, SealClient, SealConfig, SystemClock};
//! use sealgate::transport::{KeypairWallet, LedgerClient, KeyServer};
//!
//! async fn example(
//!     config: SealConfig,
//!     ledger: Arc<dyn LedgerClient>,
//!     servers: Vec<Arc<dyn KeyServer>>,
//!     wallet: KeypairWallet,
//! ) -> sealgate::Result<()> {
//!     let client = SealClient::new(config, ledger, servers, Arc::new(SystemClock))?;
//!
//!     let policy = PolicyRef::parse("0x5c1e...")?;
//!     let nonce = Nonce::random();
//!     let (ciphertext, _backup) = client.encrypt(&policy, &nonce, b"hello").await?;
//!
//!     let session = client.create_session(wallet.address(), &wallet).await?;
//!     let plaintext = client.decrypt(&ciphertext, &session, &policy, &nonce).await?;
//!     assert_eq!(plaintext, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every operation fails with a [`SealError`]. Use
//! [`SealError::is_authorization`] and [`SealError::is_unavailable`] to tell
//! "not allowed" from "try again later".
//!
//! ## Re-exports
//!
//! - `sealgate::core` - identities, policy references, session credentials
//! - `sealgate::threshold` - threshold encryption and the ciphertext format
//! - `sealgate::transport` - ledger, key-server and wallet seams

pub mod client;
pub mod config;
pub mod error;
pub mod record;
pub mod session;

// Re-export component crates
pub use sealgate_core as core;
pub use sealgate_threshold as threshold;
pub use sealgate_transport as transport;

pub use client::SealClient;
pub use config::{KeyServerConfig, Network, SealConfig, TESTNET_KEY_SERVERS};
pub use error::{ErrorKind, Result, SealError};
pub use record::EncryptedRecord;
pub use session::SessionManager;

// Re-export commonly used types
pub use sealgate_core::{
    is_active, Address, Clock, FixedClock, Identity, Nonce, ObjectId, PackageId, PolicyRef,
    SessionCredential, SystemClock,
};
pub use sealgate_threshold::BackupKey;
