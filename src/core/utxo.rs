//! Unspent transaction output (UTXO) set
//!
//! Maps `"{txid_hex}:{output_index}"` keys to the outputs they refer
//! to. An entry exists exactly while its output has been produced by
//! an accepted block and not yet consumed by one. All mutation happens
//! under the node's exclusive lock, so lookup-then-delete is atomic
//! and double spends cannot slip through.

use crate::core::block::Block;
use crate::core::transaction::TxOutput;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The set of spendable outputs, keyed by outpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtxoSet {
    entries: HashMap<String, TxOutput>,
}

impl UtxoSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a spendable output by its `"{txid}:{index}"` key
    pub fn lookup(&self, outpoint: &str) -> Option<&TxOutput> {
        self.entries.get(outpoint)
    }

    /// Whether an outpoint is currently spendable
    pub fn contains(&self, outpoint: &str) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Apply an accepted block: remove every referenced input's entry,
    /// then insert every output. Absence of a referenced entry is
    /// tolerated so coinbase-style inputs at genesis work.
    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            for input in &tx.inputs {
                self.entries.remove(&input.outpoint_key());
            }

            let txid = tx.id();
            for (index, output) in tx.outputs.iter().enumerate() {
                self.entries
                    .insert(format!("{}:{}", txid, index), output.clone());
            }
        }
    }

    /// Rebuild the whole set by replaying every block in chain order.
    /// Used when no persisted snapshot exists.
    pub fn rebuild_from_chain(chain: &[Block]) -> Self {
        let mut set = Self::new();
        for block in chain {
            set.apply_block(block);
        }
        set
    }

    /// Total value currently spendable
    pub fn total_value(&self) -> u64 {
        self.entries.values().map(|o| o.amount).sum()
    }

    /// Value spendable by the owner of `locking_script`
    pub fn balance_of(&self, locking_script: &[u8]) -> u64 {
        self.entries
            .values()
            .filter(|o| o.locking_script == locking_script)
            .map(|o| o.amount)
            .sum()
    }

    /// Number of spendable outputs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(outpoint, output)` entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TxOutput)> {
        self.entries.iter()
    }
}
