//! The policy-check call.
//!
//! Key servers decide whether to release a key by simulating a call to the
//! policy predicate on the ledger:
//!
//! ```text
//! {package}::{module}::{function}(id: vector<u8>, policy: &Object)
//! ```
//!
//! The client builds the call and sends its canonical transaction-kind bytes
//! with every fetch request. It is never submitted as a transaction; the
//! bytes only tell the servers what to simulate, with the session's address
//! as sender.

use ciborium::value::Value;

use sealgate_core::canonical::{canonical_cbor, decode_cbor, map_get};
use sealgate_core::{Identity, PackageId, PolicyRef};

use crate::error::{Result, TransportError};

/// Version tag of the transaction-kind encoding.
pub const TX_KIND_VERSION: u8 = 1;

mod keys {
    pub const VERSION: u64 = 0;
    pub const PACKAGE: u64 = 1;
    pub const MODULE: u64 = 2;
    pub const FUNCTION: u64 = 3;
    pub const ARGS: u64 = 4;
}

/// An argument to the predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// A pure `vector<u8>` value.
    Pure(Vec<u8>),
    /// A shared object reference.
    Object(PolicyRef),
}

/// A non-executing call to the policy predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCall {
    pub package: PackageId,
    pub module: String,
    pub function: String,
    pub args: Vec<CallArg>,
}

impl PolicyCall {
    /// `{package}::{module}::{function}(id, policy)`.
    pub fn approve(
        package: PackageId,
        module: impl Into<String>,
        function: impl Into<String>,
        id: &Identity,
        policy: &PolicyRef,
    ) -> Self {
        Self {
            package,
            module: module.into(),
            function: function.into(),
            args: vec![
                CallArg::Pure(id.as_bytes().to_vec()),
                CallArg::Object(policy.clone()),
            ],
        }
    }

    /// Fully qualified call target.
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }

    /// The `id` argument, if the call has the approve shape.
    pub fn id_arg(&self) -> Option<&[u8]> {
        match self.args.first() {
            Some(CallArg::Pure(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// The policy object argument, if the call has the approve shape.
    pub fn policy_arg(&self) -> Option<&PolicyRef> {
        match self.args.get(1) {
            Some(CallArg::Object(policy)) => Some(policy),
            _ => None,
        }
    }

    /// Canonical transaction-kind bytes.
    pub fn to_tx_kind_bytes(&self) -> Result<Vec<u8>> {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                CallArg::Pure(bytes) => Value::Array(vec![
                    Value::Integer(0.into()),
                    Value::Bytes(bytes.clone()),
                ]),
                CallArg::Object(policy) => Value::Array(vec![
                    Value::Integer(1.into()),
                    Value::Bytes(policy.as_bytes().to_vec()),
                ]),
            })
            .collect();

        let value = Value::Map(vec![
            (Value::Integer(keys::VERSION.into()), Value::Integer(TX_KIND_VERSION.into())),
            (
                Value::Integer(keys::PACKAGE.into()),
                Value::Bytes(self.package.as_bytes().to_vec()),
            ),
            (Value::Integer(keys::MODULE.into()), Value::Text(self.module.clone())),
            (Value::Integer(keys::FUNCTION.into()), Value::Text(self.function.clone())),
            (Value::Integer(keys::ARGS.into()), Value::Array(args)),
        ]);

        canonical_cbor(&value).map_err(|e| TransportError::Serialization(e.to_string()))
    }

    /// Decode transaction-kind bytes.
    pub fn from_tx_kind_bytes(bytes: &[u8]) -> Result<Self> {
        let invalid = |msg: &str| TransportError::InvalidRequest(format!("policy call: {msg}"));

        let value = decode_cbor(bytes).map_err(|e| invalid(&e.to_string()))?;
        let map = match &value {
            Value::Map(m) => m,
            _ => return Err(invalid("expected map")),
        };

        match map_get(map, keys::VERSION) {
            Some(Value::Integer(v)) if i128::from(*v) == TX_KIND_VERSION as i128 => {}
            _ => return Err(invalid("unsupported version")),
        }

        let package = match map_get(map, keys::PACKAGE) {
            Some(Value::Bytes(b)) => {
                let arr: [u8; 32] = b.as_slice().try_into().map_err(|_| invalid("package length"))?;
                PackageId::from_bytes(arr)
            }
            _ => return Err(invalid("missing package")),
        };
        let text = |key| match map_get(map, key) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(invalid("missing name")),
        };
        let module = text(keys::MODULE)?;
        let function = text(keys::FUNCTION)?;

        let raw_args = match map_get(map, keys::ARGS) {
            Some(Value::Array(a)) => a,
            _ => return Err(invalid("missing args")),
        };
        let mut args = Vec::with_capacity(raw_args.len());
        for arg in raw_args {
            let parsed = match arg {
                Value::Array(pair) => match pair.as_slice() {
                    [Value::Integer(tag), Value::Bytes(b)] if i128::from(*tag) == 0 => {
                        CallArg::Pure(b.clone())
                    }
                    [Value::Integer(tag), Value::Bytes(b)] if i128::from(*tag) == 1 => {
                        CallArg::Object(
                            PolicyRef::from_bytes(b.clone()).map_err(|e| invalid(&e.to_string()))?,
                        )
                    }
                    _ => return Err(invalid("unknown argument kind")),
                },
                _ => return Err(invalid("argument is not a pair")),
            };
            args.push(parsed);
        }

        Ok(Self {
            package,
            module,
            function,
            args,
        })
    }
}
