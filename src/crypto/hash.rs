//! Cryptographic hashing utilities for the blockchain
//!
//! Provides SHA3-256 based hashing used for transaction IDs, block
//! hashes, and locking scripts, plus the leading-zero-bits difficulty
//! predicate used by proof of work.

use sha3::{Digest, Sha3_256};

/// Computes SHA3-256 hash of the input data
pub fn sha3_256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA3-256 hash and returns it as a hex string
pub fn sha3_256_hex(data: &[u8]) -> String {
    hex::encode(sha3_256(data))
}

/// Counts the number of leading zero bits in a hash
/// (most-significant-bit-first interpretation)
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut bits = 0u32;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Checks if a hash meets the difficulty target
/// The hash must have at least `bits` leading zero bits
pub fn meets_difficulty(hash: &[u8], bits: u32) -> bool {
    leading_zero_bits(hash) >= bits
}
