//! Shamir secret sharing over GF(256).
//!
//! Each byte of the secret is shared with its own random polynomial of
//! degree `threshold - 1`. Share indices are the non-zero field elements
//! 1..=255; the secret sits at x = 0 and is recovered by Lagrange
//! interpolation.
//!
//! Field arithmetic uses the AES polynomial x^8 + x^4 + x^3 + x + 1 (0x11B).
//! Shares carry no integrity protection; the data-encryption layer detects a
//! wrong reconstruction.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ThresholdError};

/// One share of a split secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Evaluation point, never zero.
    pub index: u8,
    /// Polynomial values, one per secret byte.
    pub value: Vec<u8>,
}

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse, a^254. Undefined for zero.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Horner evaluation; `coefficients[0]` is the constant term.
fn eval_poly(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, c| gf_mul(acc, x) ^ c)
}

/// Split `secret` into `total` shares, any `threshold` of which recover it.
pub fn split(secret: &[u8], threshold: u8, total: u8) -> Result<Vec<Share>> {
    if threshold == 0 {
        return Err(ThresholdError::InvalidParameters("threshold must be at least 1".into()));
    }
    if total < threshold {
        return Err(ThresholdError::InvalidParameters(format!(
            "threshold {threshold} exceeds share count {total}"
        )));
    }
    if secret.is_empty() {
        return Err(ThresholdError::InvalidParameters("secret is empty".into()));
    }

    let mut rng = rand::thread_rng();
    let mut shares: Vec<Share> = (1..=total)
        .map(|index| Share {
            index,
            value: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut coefficients = vec![0u8; threshold as usize];
    for &byte in secret {
        coefficients[0] = byte;
        rng.fill_bytes(&mut coefficients[1..]);
        for share in &mut shares {
            share.value.push(eval_poly(&coefficients, share.index));
        }
    }

    Ok(shares)
}

/// Recover the secret from at least `threshold` distinct shares.
///
/// All supplied shares are used; callers pass exactly the shares they trust.
pub fn combine(shares: &[Share], threshold: u8) -> Result<Vec<u8>> {
    let needed = threshold as usize;
    if shares.len() < needed || needed == 0 {
        return Err(ThresholdError::InsufficientShares {
            needed,
            have: shares.len(),
        });
    }

    let len = shares[0].value.len();
    for (i, share) in shares.iter().enumerate() {
        if share.index == 0 {
            return Err(ThresholdError::InvalidParameters("share index 0".into()));
        }
        if share.value.len() != len {
            return Err(ThresholdError::InvalidParameters("share length mismatch".into()));
        }
        if shares[..i].iter().any(|s| s.index == share.index) {
            return Err(ThresholdError::InvalidParameters(format!(
                "duplicate share index {}",
                share.index
            )));
        }
    }

    // Lagrange basis at x = 0: l_i = prod_{j != i} x_j / (x_j - x_i).
    // Subtraction is XOR in GF(256).
    let basis: Vec<u8> = shares
        .iter()
        .map(|si| {
            shares
                .iter()
                .filter(|sj| sj.index != si.index)
                .fold(1u8, |acc, sj| {
                    gf_mul(acc, gf_mul(sj.index, gf_inv(sj.index ^ si.index)))
                })
        })
        .collect();

    let secret = (0..len)
        .map(|pos| {
            shares
                .iter()
                .zip(&basis)
                .fold(0u8, |acc, (share, l)| acc ^ gf_mul(share.value[pos], *l))
        })
        .collect();

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_field_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse of {a}");
        }
    }

    #[test]
    fn test_known_product() {
        // FIPS-197 example: {57} x {83} = {c1}
        assert_eq!(gf_mul(0x57, 0x83), 0xc1);
    }

    #[test]
    fn test_threshold_one_shares_equal_secret() {
        let shares = split(b"abc", 1, 3).unwrap();
        for share in &shares {
            assert_eq!(share.value, b"abc");
        }
    }

    #[test]
    fn test_any_subset_of_threshold_recovers() {
        let secret = [0x5au8; 32];
        let shares = split(&secret, 3, 5).unwrap();

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = vec![shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    assert_eq!(combine(&subset, 3).unwrap(), secret);
                }
            }
        }
    }

    #[test]
    fn test_below_threshold_fails() {
        let shares = split(b"secret", 3, 5).unwrap();
        assert!(matches!(
            combine(&shares[..2], 3),
            Err(ThresholdError::InsufficientShares { needed: 3, have: 2 })
        ));
    }

    #[test]
    fn test_below_threshold_interpolates_garbage() {
        // Two shares of a 3-threshold split interpolate a degree-1 polynomial,
        // which almost surely misses the secret.
        let secret = [0x11u8; 32];
        let shares = split(&secret, 3, 5).unwrap();
        assert_ne!(combine(&shares[..2], 2).unwrap(), secret);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let shares = split(b"k", 2, 3).unwrap();
        let dup = vec![shares[0].clone(), shares[0].clone()];
        assert!(combine(&dup, 2).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(split(b"k", 0, 3).is_err());
        assert!(split(b"k", 4, 3).is_err());
        assert!(split(b"", 1, 1).is_err());
    }

    proptest! {
        #[test]
        fn threshold_subset_recovers(
            secret in prop::collection::vec(any::<u8>(), 1..64),
            threshold in 1u8..6,
            extra in 0u8..4,
            skip in 0usize..4,
        ) {
            let total = threshold + extra;
            let shares = split(&secret, threshold, total).unwrap();
            let start = skip.min(extra as usize);
            let subset = &shares[start..start + threshold as usize];
            prop_assert_eq!(combine(subset, threshold).unwrap(), secret);
        }
    }
}
