//! Picochain: a minimal proof-of-work blockchain node
//!
//! This crate provides a small but complete blockchain node featuring:
//! - UTXO-based transactions with ECDSA signatures (secp256k1)
//! - SHA3-256 content addressing for transactions and blocks
//! - Proof of Work over a leading-zero-bits difficulty target
//! - A concurrency-safe mempool with single-flight mining
//! - A newline-delimited TCP protocol for transactions and blocks
//! - JSON persistence of the chain and the UTXO set
//! - Block gossip to configured peers
//!
//! # Example
//!
//! ```rust
//! use picochain::core::{Block, Transaction, UtxoSet};
//! use picochain::crypto::KeyPair;
//!
//! // Seed value to a key and mine a block containing it
//! let alice = KeyPair::generate();
//! let coinbase = Transaction::coinbase(1_000_000, alice.public_key_hash());
//!
//! let mut block = Block::new(Block::zero_hash(), 12, vec![coinbase]);
//! block.find_valid_nonce().expect("nonce space exhausted");
//!
//! let mut utxo = UtxoSet::new();
//! utxo.apply_block(&block);
//! assert_eq!(utxo.total_value(), 1_000_000);
//! ```

pub mod core;
pub mod crypto;
pub mod node;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{Block, Transaction, TxInput, TxOutput, UtxoSet, ValidationError};
pub use crate::crypto::KeyPair;
pub use crate::node::{Node, NodeConfig, Response, DEFAULT_DIFFICULTY};
pub use crate::storage::Storage;
