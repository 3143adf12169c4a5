//! Core blockchain components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model with a fixed public-key hash lock)
//! - Blocks (canonical encoding and proof of work)
//! - The UTXO set (spendable output ledger)
//! - Validation (signature, linkage, and proof-of-work checks)

pub mod block;
pub mod transaction;
pub mod utxo;
pub mod validation;

pub use block::{Block, BLOCK_HASH_LEN, BLOCK_VERSION};
pub use transaction::{Transaction, TransactionError, TxInput, TxOutput, TX_VERSION};
pub use utxo::UtxoSet;
pub use validation::{
    validate_block, validate_transaction, BlockOverlay, UtxoView, ValidationError,
};
