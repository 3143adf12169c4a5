//! Transaction handling for the blockchain
//!
//! Implements a UTXO-based transaction model with a fixed hash-lock:
//! each output locks an amount to the SHA3-256 hash of the spender's
//! public key, and each input proves ownership with an ECDSA signature
//! over the transaction's signing hash.
//!
//! Two canonical byte layouts matter here:
//! - `encode()` is the identity encoding: its hash is the transaction ID.
//! - `signing_hash()` is the same layout with every signature cleared,
//!   so all inputs are signed over identical, signature-free content.

use crate::crypto::{sha3_256, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current transaction version
pub const TX_VERSION: u32 = 1;

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Transaction input (reference to a previous output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Raw 32-byte ID of the previous transaction
    pub prev_tx: Vec<u8>,
    /// Index of the output being spent in the previous transaction
    pub prev_index: u32,
    /// Compact `r || s` signature proving ownership
    #[serde(default)]
    pub signature: Vec<u8>,
    /// Spender's public key (uncompressed SEC1)
    #[serde(default)]
    pub public_key: Vec<u8>,
    /// Network tag, part of the signed content
    pub net: String,
}

impl TxInput {
    /// Key of the UTXO entry this input spends
    pub fn outpoint_key(&self) -> String {
        format!("{}:{}", hex::encode(&self.prev_tx), self.prev_index)
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount of coins
    pub amount: u64,
    /// Spending condition: SHA3-256 hash of the recipient's public key
    pub locking_script: Vec<u8>,
}

/// A blockchain transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction version (for future upgrades)
    pub version: u32,
    /// Transaction inputs
    pub inputs: Vec<TxInput>,
    /// Transaction outputs
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
        }
    }

    /// Create a coinbase-style transaction: no inputs, one output
    /// locking `amount` to `locking_script`. Used to seed initial value.
    pub fn coinbase(amount: u64, locking_script: Vec<u8>) -> Self {
        Self::new(
            vec![],
            vec![TxOutput {
                amount,
                locking_script,
            }],
        )
    }

    /// Whether this transaction spends nothing (coinbase-style)
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Canonical little-endian serialization.
    /// The public key is deliberately not part of this layout.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_inner(false)
    }

    fn encode_inner(&self, clear_signatures: bool) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_tx);
            buf.extend_from_slice(&input.prev_index.to_le_bytes());
            let sig: &[u8] = if clear_signatures {
                &[]
            } else {
                &input.signature
            };
            buf.extend_from_slice(&(sig.len() as u32).to_le_bytes());
            buf.extend_from_slice(sig);
            buf.extend_from_slice(input.net.as_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.amount.to_le_bytes());
            buf.extend_from_slice(&(output.locking_script.len() as u32).to_le_bytes());
            buf.extend_from_slice(&output.locking_script);
        }

        buf
    }

    /// Content-addressed transaction ID: hex of the hash of `encode()`
    pub fn id(&self) -> String {
        hex::encode(self.id_bytes())
    }

    /// Transaction ID as raw bytes, as referenced by `TxInput::prev_tx`
    pub fn id_bytes(&self) -> Vec<u8> {
        sha3_256(&self.encode())
    }

    /// Hash of the canonical layout with every input's signature cleared
    /// to empty, so signing cannot depend on existing signatures
    pub fn signing_hash(&self) -> Vec<u8> {
        sha3_256(&self.encode_inner(true))
    }

    /// Sign every input with one signature over `signing_hash()` and
    /// stamp the key pair's public key on each input.
    ///
    /// Single-signer simplification: all inputs get the same signature,
    /// so a transaction cannot mix spenders.
    pub fn sign_all(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let signature = key_pair.sign(&self.signing_hash())?;
        let public_key = key_pair.public_key_bytes();

        for input in &mut self.inputs {
            input.signature = signature.clone();
            input.public_key = public_key.clone();
        }

        Ok(())
    }

    /// Get total output amount
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}
