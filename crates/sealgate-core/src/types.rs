//! Strong type definitions for ledger identifiers.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Ledger
//! identifiers are written as hex with an optional `0x` prefix; parsing is
//! case-insensitive and the canonical form is lowercase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Width in bytes of a full ledger identifier.
pub const ID_LENGTH: usize = 32;

/// Strip an optional `0x`/`0X` prefix.
fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a 32-byte identifier, left-padding short forms with zeros
/// (`0x2` is the same object as `0x000…002`).
fn parse_id32(s: &str) -> Result<[u8; ID_LENGTH]> {
    let body = strip_hex_prefix(s.trim());
    if body.is_empty() {
        return Err(CoreError::MalformedReference("empty identifier".into()));
    }
    if body.len() > ID_LENGTH * 2 {
        return Err(CoreError::MalformedReference(format!(
            "identifier has {} hex digits, maximum is {}",
            body.len(),
            ID_LENGTH * 2
        )));
    }
    let padded = format!("{:0>width$}", body, width = ID_LENGTH * 2);
    let bytes = hex::decode(&padded)
        .map_err(|e| CoreError::MalformedReference(format!("{s:?}: {e}")))?;
    let mut arr = [0u8; ID_LENGTH];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; ID_LENGTH]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            /// Parse from hex, with or without `0x`.
            pub fn parse(s: &str) -> Result<Self> {
                parse_id32(s).map(Self)
            }

            /// Lowercase hex without prefix.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// The all-zero identifier.
            pub const ZERO: Self = Self([0u8; ID_LENGTH]);
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "(0x{})"), &self.to_hex()[..16])
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; ID_LENGTH]> for $name {
            fn from(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

ledger_id!(
    /// Identifier of a deployed policy package. Scopes session credentials
    /// and forms part of every identity's scheme prefix.
    PackageId,
    "Package"
);

ledger_id!(
    /// Identifier of an on-ledger object, such as a key-server descriptor.
    ObjectId,
    "Object"
);

ledger_id!(
    /// Account address of a requester.
    Address,
    "Address"
);

/// Handle to a remotely stored access-policy object (a whitelist).
///
/// Always the full 32-byte object id. Short hex forms are left-padded with
/// zeros the same way the ledger normalizes them, so the policy segment of an
/// identity has a fixed width and no policy can be a prefix of another. The
/// hex body must have an even number of digits and decode to 1..=32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyRef([u8; ID_LENGTH]);

impl PolicyRef {
    /// Parse a policy reference, stripping any `0x` prefix.
    pub fn parse(s: &str) -> Result<Self> {
        let body = strip_hex_prefix(s.trim());
        if body.is_empty() {
            return Err(CoreError::MalformedReference("empty policy reference".into()));
        }
        if body.len() % 2 != 0 {
            return Err(CoreError::MalformedReference(format!(
                "{s:?}: odd number of hex digits"
            )));
        }
        if body.len() > ID_LENGTH * 2 {
            return Err(CoreError::MalformedReference(format!(
                "{s:?}: longer than {ID_LENGTH} bytes"
            )));
        }
        let bytes =
            hex::decode(body).map_err(|e| CoreError::MalformedReference(format!("{s:?}: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Create from 1..=32 raw bytes, left-padding short forms.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > ID_LENGTH {
            return Err(CoreError::MalformedReference(format!(
                "policy reference must be 1..={ID_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; ID_LENGTH];
        arr[ID_LENGTH - bytes.len()..].copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The 32 padded bytes, as they appear in an identity.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex of all 32 bytes, without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The ledger object this reference points at.
    pub fn object_id(&self) -> ObjectId {
        ObjectId(self.0)
    }
}

impl From<ObjectId> for PolicyRef {
    fn from(id: ObjectId) -> Self {
        Self(id.0)
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicyRef({self})")
    }
}

impl FromStr for PolicyRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PolicyRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
