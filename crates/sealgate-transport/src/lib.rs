//! # sealgate transport
//!
//! The collaborators a sealgate client talks to, as async traits, with
//! in-memory implementations for tests.
//!
//! ## Collaborators
//!
//! - [`LedgerClient`] - reads key-server descriptors and simulates the policy
//!   predicate as a given sender
//! - [`KeyServer`] - releases wrap keys for an identity once the predicate
//!   approves the session's address
//! - [`WalletSigner`] - signs the session personal message
//!
//! ## Message Flow
//!
//! ```text
//! Client                         Key server                    Ledger
//!   |---- FetchKeyRequest ---------->|                            |
//!   |                                |---- dry_run(sender, call)->|
//!   |                                |<--- approved --------------|
//!   |<--- FetchKeyResponse ----------|                            |
//! ```
//!
//! A request carries the ciphertext, the policy call's transaction-kind
//! bytes, a one-time response key and the session certificate, signed by
//! the session key.

pub mod error;
pub mod keyserver;
pub mod ledger;
pub mod messages;
pub mod policy;
pub mod wallet;

pub use error::{Result, SignerError, TransportError};
pub use keyserver::{local::LocalKeyServer, KeyServer};
pub use ledger::{memory::MemoryLedger, LedgerClient};
pub use messages::{
    limits, FetchKeyRequest, FetchKeyResponse, KeyServerDescriptor, PROTOCOL_VERSION,
};
pub use policy::{CallArg, PolicyCall, TX_KIND_VERSION};
pub use wallet::{verify_personal_message, KeypairWallet, WalletSigner, ED25519_FLAG};
