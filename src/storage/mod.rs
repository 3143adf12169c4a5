//! Storage module for blockchain persistence

pub mod persistence;

pub use persistence::{Storage, StorageError, CHAIN_FILE, UTXO_FILE};
