//! Block implementation for the blockchain
//!
//! A block commits to a previous block hash, a timestamp, a difficulty
//! target in leading zero bits, and an ordered list of transactions.
//! The nonce is part of the canonical encoding, so the proof-of-work
//! search changes the block's identity on every iteration.

use crate::core::transaction::Transaction;
use crate::crypto::{meets_difficulty, sha3_256};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current block version
pub const BLOCK_VERSION: u32 = 1;

/// Length of a block hash (and of `prev_block`)
pub const BLOCK_HASH_LEN: usize = 32;

/// A block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block version
    pub version: u32,
    /// Hash of the previous block (all zeros for the first block)
    pub prev_block: Vec<u8>,
    /// Block creation time (Unix seconds)
    pub timestamp: u64,
    /// Nonce iterated by the proof-of-work search
    pub nonce: u64,
    /// Difficulty target: required leading zero bits of the block hash
    pub bits: u32,
    /// Transactions committed by this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create an unmined candidate block on top of `prev_block`
    pub fn new(prev_block: Vec<u8>, bits: u32, transactions: Vec<Transaction>) -> Self {
        Self {
            version: BLOCK_VERSION,
            prev_block,
            timestamp: Utc::now().timestamp() as u64,
            nonce: 0,
            bits,
            transactions,
        }
    }

    /// The all-zero hash a first block links to
    pub fn zero_hash() -> Vec<u8> {
        vec![0u8; BLOCK_HASH_LEN]
    }

    /// Canonical little-endian serialization, nonce included
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.prev_block);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());

        buf.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.encode());
        }

        buf
    }

    /// Block identity: hash of the canonical encoding
    pub fn hash(&self) -> Vec<u8> {
        sha3_256(&self.encode())
    }

    /// Block hash as a hex string, for logging
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Check if the current nonce satisfies the difficulty target
    pub fn is_valid_pow(&self) -> bool {
        meets_difficulty(&self.hash(), self.bits)
    }

    /// Brute-force the nonce from 0 upward until the block hash has at
    /// least `bits` leading zero bits. Returns the winning nonce, or
    /// `None` if the entire 64-bit space is exhausted.
    ///
    /// This is a blocking, CPU-bound loop; callers must not hold any
    /// shared lock while running it.
    pub fn find_valid_nonce(&mut self) -> Option<u64> {
        self.nonce = 0;
        loop {
            if self.is_valid_pow() {
                return Some(self.nonce);
            }
            if self.nonce == u64::MAX {
                return None;
            }
            self.nonce += 1;
        }
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
