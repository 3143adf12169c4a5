//! Cryptographic utilities for the blockchain
//!
//! This module provides:
//! - SHA3-256 hashing and the leading-zero-bits difficulty predicate
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{leading_zero_bits, meets_difficulty, sha3_256, sha3_256_hex};
pub use keys::{
    public_key_from_slice, verify_signature, KeyError, KeyPair, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
