//! Strong block hashes: MD4 and BLAKE2b.
//!
//! Strong sums confirm candidate matches found by the weak rolling hash.
//! Blocks shorter than the nominal block length (the tail of an input) are
//! hashed over their actual length.

use blake2::digest::consts::U32;
use blake2::Blake2b;
use md4::{Digest, Md4};

use crate::signature::MAX_STRONG_LEN;

/// BLAKE2b parameterized for a 32-byte digest. This is not a truncation of
/// BLAKE2b-512; the output length is part of the hash parameters.
type Blake2b32 = Blake2b<U32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrongsumKind {
    Md4,
    Blake2,
}

impl StrongsumKind {
    /// Full digest width in bytes.
    pub fn sum_len(self) -> usize {
        match self {
            StrongsumKind::Md4 => 16,
            StrongsumKind::Blake2 => 32,
        }
    }
}

/// Hash `buf` into a fixed strong-sum buffer.
///
/// Only the first `kind.sum_len()` bytes are meaningful; comparisons and
/// wire output truncate further to the signature's strong-sum length.
pub fn calc_strong_sum(kind: StrongsumKind, buf: &[u8]) -> [u8; MAX_STRONG_LEN] {
    let mut sum = [0u8; MAX_STRONG_LEN];
    match kind {
        StrongsumKind::Md4 => {
            sum[..16].copy_from_slice(&Md4::digest(buf));
        }
        StrongsumKind::Blake2 => {
            sum[..32].copy_from_slice(&Blake2b32::digest(buf));
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md4_known_vector() {
        // RFC 1320 test vector for "abc".
        let sum = calc_strong_sum(StrongsumKind::Md4, b"abc");
        assert_eq!(hex::encode(&sum[..16]), "a448017aaf21d8525fc10ae87aa6729d");
        assert_eq!(&sum[16..], &[0u8; 16]);
    }

    #[test]
    fn test_md4_empty_vector() {
        let sum = calc_strong_sum(StrongsumKind::Md4, b"");
        assert_eq!(hex::encode(&sum[..16]), "31d6cfe0d16ae931b73c59d7e0c089c0");
    }

    #[test]
    fn test_blake2_differs_by_length() {
        let a = calc_strong_sum(StrongsumKind::Blake2, &[0u8; 8]);
        let b = calc_strong_sum(StrongsumKind::Blake2, &[0u8; 9]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_blake2_is_32_byte_parameterized() {
        // BLAKE2b-256("abc") from the reference implementation; a truncated
        // BLAKE2b-512 would differ.
        let sum = calc_strong_sum(StrongsumKind::Blake2, b"abc");
        assert_eq!(
            hex::encode(&sum[..32]),
            "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319"
        );
    }
}
