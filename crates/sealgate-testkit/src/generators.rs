//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealgate_core::{Address, Identity, Keypair, Nonce, PackageId, PolicyRef, MAX_NONCE_LEN};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random PackageId.
pub fn package_id() -> impl Strategy<Value = PackageId> {
    any::<[u8; 32]>().prop_map(PackageId::from_bytes)
}

/// Generate a random Address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>().prop_map(Address::from_bytes)
}

/// Generate a policy reference of 1..=32 bytes.
pub fn policy_ref() -> impl Strategy<Value = PolicyRef> {
    prop::collection::vec(any::<u8>(), 1..=32)
        .prop_map(|bytes| PolicyRef::from_bytes(bytes).expect("length is in range"))
}

/// Generate a nonce of 1..=`MAX_NONCE_LEN` bytes.
pub fn nonce() -> impl Strategy<Value = Nonce> {
    prop::collection::vec(any::<u8>(), 1..=MAX_NONCE_LEN)
        .prop_map(|bytes| Nonce::from_bytes(bytes).expect("length is in range"))
}

/// Generate a textual nonce.
pub fn text_nonce() -> impl Strategy<Value = Nonce> {
    "[a-z0-9-]{1,36}".prop_map(|s| Nonce::from_text(&s).expect("length is in range"))
}

/// Generate plaintext bytes of specified max length.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters of one encryption.
#[derive(Debug, Clone)]
pub struct IdentityParams {
    pub package_id: PackageId,
    pub policy: PolicyRef,
    pub nonce: Nonce,
}

impl Arbitrary for IdentityParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (package_id(), policy_ref(), nonce())
            .prop_map(|(package_id, policy, nonce)| IdentityParams {
                package_id,
                policy,
                nonce,
            })
            .boxed()
    }
}

/// Derive the identity described by `params`.
pub fn identity_from_params(params: &IdentityParams) -> Identity {
    Identity::encode(&params.policy, &params.nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn identity_is_deterministic(params: IdentityParams) {
            prop_assert_eq!(identity_from_params(&params), identity_from_params(&params));
        }

        #[test]
        fn full_identity_layout(params: IdentityParams) {
            let id = identity_from_params(&params);
            let full = id.full(&params.package_id);
            let bytes = full.as_bytes();

            prop_assert_eq!(bytes[0], sealgate_core::IDENTITY_SCHEME_V1);
            prop_assert_eq!(&bytes[1..33], params.package_id.as_bytes());
            prop_assert_eq!(&bytes[33..], id.as_bytes());
        }

        #[test]
        fn identity_is_scoped_to_its_policy(params: IdentityParams) {
            let id = identity_from_params(&params);
            prop_assert!(id.is_scoped_to(&params.policy));
        }
    }
}
