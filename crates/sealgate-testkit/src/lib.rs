//! # sealgate testkit
//!
//! Testing utilities for sealgate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: identity bytes and session messages every
//!   implementation must reproduce exactly
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: an in-memory ledger with a whitelist, local key servers
//!   and a controllable clock
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use sealgate_testkit::fixtures::{policy, wallet, TestCluster};
//! use sealgate::Nonce;
//!
//! # async fn example() {
//! let cluster = TestCluster::new(3, 2).await;
//! let alice = wallet(1);
//! cluster.whitelist(&policy(1), &[alice.address()]).await;
//!
//! let client = cluster.client();
//! let nonce = Nonce::random();
//! let (ciphertext, _backup) = client.encrypt(&policy(1), &nonce, b"hi").await.unwrap();
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{policy, wallet, ScriptedSigner, SignerScript, TestCluster, T0, TEST_PACKAGE};
pub use generators::{identity_from_params, IdentityParams};
pub use vectors::{identity_vectors, session_vectors, verify_identity_vectors, IdentityVector, SessionVector};
