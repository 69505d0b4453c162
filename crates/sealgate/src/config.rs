//! Client configuration.
//!
//! Loaded from TOML; every field has a default so a minimal file only names
//! the policy package:
//!
//! ```toml
//! package_id = "0x8afa...c3f1"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sealgate_core::{ObjectId, PackageId, DEFAULT_TTL_MIN, MAX_TTL_MIN};
use sealgate_threshold::MAX_SHARES;

use crate::error::{Result, SealError};

/// Testnet key servers operated for public use.
pub const TESTNET_KEY_SERVERS: [&str; 2] = [
    "0x73d05d62c18d9374e3ea529e8e0ed6161da1a141a94d3f76ae3fe4e99356db75",
    "0xf5d14a81a982144ae441cd7d64b09027f116a468bd36e7eca494f750591623c8",
];

/// Ledger network the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
    Devnet,
    Localnet,
}

impl Network {
    /// JSON-RPC endpoint of the network's public full node.
    pub fn fullnode_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://fullnode.testnet.sui.io:443",
            Network::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Network::Devnet => "https://fullnode.devnet.sui.io:443",
            Network::Localnet => "http://127.0.0.1:9000",
        }
    }
}

/// A key server the client encrypts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerConfig {
    pub object_id: ObjectId,
    /// Number of shares the server holds (default: 1)
    #[serde(default = "default_weight")]
    pub weight: u8,
}

fn default_weight() -> u8 {
    1
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub network: Network,
    pub key_servers: Vec<KeyServerConfig>,
    /// Package holding the policy module (required)
    pub package_id: PackageId,
    /// Policy module name (default: whitelist)
    pub policy_module: String,
    /// Predicate function name (default: seal_approve)
    pub policy_function: String,
    /// Session lifetime in minutes, 1..=30 (default: 10)
    pub session_ttl_min: u16,
    /// Share weight needed to decrypt (default: 1)
    pub threshold: u8,
    /// Bound on the key-server fan-out (default: 10s)
    pub request_timeout_ms: u64,
    /// Bound on the wallet signing prompt (default: 2 min)
    pub signing_timeout_ms: u64,
    /// Largest plaintext accepted by `encrypt` (default: 64 MiB)
    pub max_plaintext_bytes: usize,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            key_servers: TESTNET_KEY_SERVERS
                .iter()
                .filter_map(|id| ObjectId::parse(id).ok())
                .map(|object_id| KeyServerConfig {
                    object_id,
                    weight: 1,
                })
                .collect(),
            package_id: PackageId::ZERO,
            policy_module: "whitelist".into(),
            policy_function: "seal_approve".into(),
            session_ttl_min: DEFAULT_TTL_MIN,
            threshold: 1,
            request_timeout_ms: 10_000,
            signing_timeout_ms: 120_000,
            max_plaintext_bytes: 64 * 1024 * 1024,
        }
    }
}

impl SealConfig {
    /// Default configuration for a given policy package.
    pub fn for_package(package_id: PackageId) -> Self {
        Self {
            package_id,
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| SealError::InvalidInput(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SealError::InvalidInput(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SealError::InvalidInput(format!("config: {e}")))
    }

    /// Sum of all server weights.
    pub fn total_weight(&self) -> usize {
        self.key_servers.iter().map(|s| s.weight as usize).sum()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn signing_timeout(&self) -> Duration {
        Duration::from_millis(self.signing_timeout_ms)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SealError::InvalidInput(msg));

        if self.package_id == PackageId::ZERO {
            return invalid("package_id is not set".into());
        }
        if self.policy_module.is_empty() || self.policy_function.is_empty() {
            return invalid("policy module and function must be named".into());
        }
        if self.session_ttl_min == 0 || self.session_ttl_min > MAX_TTL_MIN {
            return invalid(format!(
                "session_ttl_min must be 1..={MAX_TTL_MIN}, got {}",
                self.session_ttl_min
            ));
        }
        if self.key_servers.iter().any(|s| s.weight == 0) {
            return invalid("key server weight must be at least 1".into());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.key_servers.iter().find(|s| !seen.insert(s.object_id)) {
            return invalid(format!("key server {} listed twice", dup.object_id));
        }
        if self.total_weight() > MAX_SHARES {
            return invalid(format!(
                "total key server weight {} exceeds {MAX_SHARES} shares",
                self.total_weight()
            ));
        }
        if self.threshold == 0 {
            return invalid("threshold must be at least 1".into());
        }
        if self.threshold as usize > self.total_weight() {
            return invalid(format!(
                "threshold {} exceeds total key server weight {}",
                self.threshold,
                self.total_weight()
            ));
        }
        if self.request_timeout_ms == 0 || self.signing_timeout_ms == 0 {
            return invalid("timeouts must be positive".into());
        }
        Ok(())
    }
}
