//! Transaction and block validation
//!
//! Transactions are checked input by input against a view of spendable
//! outputs: the referenced output must exist, the spender's public key
//! must hash to its locking script, the key must parse as a point on
//! the curve, and the signature must verify against the transaction's
//! signing hash. Any failing input rejects the whole transaction.
//!
//! Blocks additionally check chain linkage and proof of work, and
//! validate their transactions against an overlay view so outputs
//! created earlier in the same block are spendable by later ones.

use crate::core::block::Block;
use crate::core::transaction::{Transaction, TxOutput};
use crate::core::utxo::UtxoSet;
use crate::crypto::{
    leading_zero_bits, public_key_from_slice, sha3_256, verify_signature, SIGNATURE_LEN,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Previous output not found: {0}")]
    PreviousOutputNotFound(String),
    #[error("Locking script mismatch in input #{0}")]
    LockingScriptMismatch(usize),
    #[error("Invalid public key in input #{0}: {1}")]
    InvalidPublicKey(usize, String),
    #[error("Invalid signature in input #{0}: expected {SIGNATURE_LEN} bytes, got {1}")]
    MalformedSignature(usize, usize),
    #[error("Signature verification failed in input #{0}")]
    SignatureInvalid(usize),
    #[error("Block does not connect to the chain tip")]
    BrokenChainLink,
    #[error("Insufficient proof of work: {got} leading zero bits, need {required}")]
    InsufficientProofOfWork { got: u32, required: u32 },
    #[error("Transaction {txid} rejected: {source}")]
    TransactionRejected {
        txid: String,
        #[source]
        source: Box<ValidationError>,
    },
}

/// A resolvable view of spendable outputs
pub trait UtxoView {
    /// Resolve an outpoint key (`"{txid}:{index}"`) to its output
    fn resolve(&self, outpoint: &str) -> Option<TxOutput>;
}

impl UtxoView for UtxoSet {
    fn resolve(&self, outpoint: &str) -> Option<TxOutput> {
        self.lookup(outpoint).cloned()
    }
}

/// Committed UTXO state overlaid with the effects of transactions
/// processed earlier in the same block: their outputs become
/// spendable, their spent outpoints disappear.
pub struct BlockOverlay<'a> {
    base: &'a UtxoSet,
    created: HashMap<String, TxOutput>,
    spent: HashSet<String>,
}

impl<'a> BlockOverlay<'a> {
    pub fn new(base: &'a UtxoSet) -> Self {
        Self {
            base,
            created: HashMap::new(),
            spent: HashSet::new(),
        }
    }

    /// Record a validated transaction's effects in the overlay
    pub fn absorb(&mut self, tx: &Transaction) {
        for input in &tx.inputs {
            let key = input.outpoint_key();
            self.created.remove(&key);
            self.spent.insert(key);
        }
        let txid = tx.id();
        for (index, output) in tx.outputs.iter().enumerate() {
            self.created
                .insert(format!("{}:{}", txid, index), output.clone());
        }
    }
}

impl UtxoView for BlockOverlay<'_> {
    fn resolve(&self, outpoint: &str) -> Option<TxOutput> {
        if self.spent.contains(outpoint) {
            return None;
        }
        self.created
            .get(outpoint)
            .cloned()
            .or_else(|| self.base.resolve(outpoint))
    }
}

/// Validate a transaction against a view of spendable outputs.
/// A coinbase-style transaction (no inputs) passes trivially.
pub fn validate_transaction(tx: &Transaction, view: &impl UtxoView) -> Result<(), ValidationError> {
    let signing_hash = tx.signing_hash();

    for (index, input) in tx.inputs.iter().enumerate() {
        let outpoint = input.outpoint_key();
        let prev_out = view
            .resolve(&outpoint)
            .ok_or(ValidationError::PreviousOutputNotFound(outpoint))?;

        if sha3_256(&input.public_key) != prev_out.locking_script {
            return Err(ValidationError::LockingScriptMismatch(index));
        }

        let public_key = public_key_from_slice(&input.public_key)
            .map_err(|e| ValidationError::InvalidPublicKey(index, e.to_string()))?;

        if input.signature.len() != SIGNATURE_LEN {
            return Err(ValidationError::MalformedSignature(
                index,
                input.signature.len(),
            ));
        }

        let valid = verify_signature(&public_key, &signing_hash, &input.signature)
            .map_err(|_| ValidationError::SignatureInvalid(index))?;
        if !valid {
            return Err(ValidationError::SignatureInvalid(index));
        }
    }

    Ok(())
}

/// Validate a block against the current chain tip and committed UTXO
/// state. `tip_hash` is `None` for an empty chain, in which case the
/// block must link to the all-zero hash.
pub fn validate_block(
    block: &Block,
    tip_hash: Option<&[u8]>,
    utxo: &UtxoSet,
) -> Result<(), ValidationError> {
    let expected_prev = match tip_hash {
        Some(hash) => hash.to_vec(),
        None => Block::zero_hash(),
    };
    if block.prev_block != expected_prev {
        return Err(ValidationError::BrokenChainLink);
    }

    let got = leading_zero_bits(&block.hash());
    if got < block.bits {
        return Err(ValidationError::InsufficientProofOfWork {
            got,
            required: block.bits,
        });
    }

    let mut overlay = BlockOverlay::new(utxo);
    for tx in &block.transactions {
        validate_transaction(tx, &overlay).map_err(|e| ValidationError::TransactionRejected {
            txid: tx.id(),
            source: Box::new(e),
        })?;
        overlay.absorb(tx);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TxInput;
    use crate::crypto::KeyPair;

    fn funded_set(key_pair: &KeyPair, amount: u64) -> (UtxoSet, Transaction) {
        let coinbase = Transaction::coinbase(amount, key_pair.public_key_hash());
        let mut set = UtxoSet::new();
        set.apply_block(&Block::new(Block::zero_hash(), 0, vec![coinbase.clone()]));
        (set, coinbase)
    }

    fn spend_to(
        prev: &Transaction,
        key_pair: &KeyPair,
        outputs: Vec<TxOutput>,
    ) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxInput {
                prev_tx: prev.id_bytes(),
                prev_index: 0,
                signature: vec![],
                public_key: vec![],
                net: "mainnet".to_string(),
            }],
            outputs,
        );
        tx.sign_all(key_pair).unwrap();
        tx
    }

    #[test]
    fn test_valid_spend() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let (set, coinbase) = funded_set(&alice, 100);

        let tx = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: bob.public_key_hash(),
            }],
        );

        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn test_coinbase_passes_trivially() {
        let set = UtxoSet::new();
        let tx = Transaction::coinbase(1_000_000, vec![0xAA; 32]);
        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn test_missing_previous_output_rejected() {
        let alice = KeyPair::generate();
        let phantom = Transaction::coinbase(100, alice.public_key_hash());
        let tx = spend_to(&phantom, &alice, vec![]);

        let empty = UtxoSet::new();
        assert!(matches!(
            validate_transaction(&tx, &empty),
            Err(ValidationError::PreviousOutputNotFound(_))
        ));
    }

    #[test]
    fn test_locking_script_mismatch_rejected() {
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let (set, coinbase) = funded_set(&alice, 100);

        // Mallory signs correctly with her own key, but the output is
        // locked to Alice's key hash
        let tx = spend_to(&coinbase, &mallory, vec![]);

        assert!(matches!(
            validate_transaction(&tx, &set),
            Err(ValidationError::LockingScriptMismatch(0))
        ));
    }

    #[test]
    fn test_bad_signature_rejected() {
        let alice = KeyPair::generate();
        let (set, coinbase) = funded_set(&alice, 100);

        let mut tx = spend_to(&coinbase, &alice, vec![]);
        // Matching key hash, corrupted signature
        tx.inputs[0].signature[10] ^= 0xFF;

        assert!(matches!(
            validate_transaction(&tx, &set),
            Err(ValidationError::SignatureInvalid(0) | ValidationError::MalformedSignature(0, _))
        ));
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let alice = KeyPair::generate();
        let (set, coinbase) = funded_set(&alice, 100);

        let mut tx = spend_to(&coinbase, &alice, vec![]);
        tx.inputs[0].signature.truncate(32);

        assert!(matches!(
            validate_transaction(&tx, &set),
            Err(ValidationError::MalformedSignature(0, 32))
        ));
    }

    #[test]
    fn test_malformed_public_key_rejected() {
        let alice = KeyPair::generate();
        let bogus_key = vec![0x05; 65];

        let coinbase = Transaction::coinbase(100, sha3_256(&bogus_key));
        let mut set = UtxoSet::new();
        set.apply_block(&Block::new(Block::zero_hash(), 0, vec![coinbase.clone()]));

        let mut tx = Transaction::new(
            vec![TxInput {
                prev_tx: coinbase.id_bytes(),
                prev_index: 0,
                signature: vec![],
                public_key: vec![],
                net: "mainnet".to_string(),
            }],
            vec![],
        );
        tx.sign_all(&alice).unwrap();
        // Key hash matches the script, but the key is not a curve point
        tx.inputs[0].public_key = bogus_key;

        assert!(matches!(
            validate_transaction(&tx, &set),
            Err(ValidationError::InvalidPublicKey(0, _))
        ));
    }

    #[test]
    fn test_block_pow_and_linkage() {
        let coinbase = Transaction::coinbase(100, vec![0xAA; 32]);
        let utxo = UtxoSet::new();

        let mut block = Block::new(Block::zero_hash(), 8, vec![coinbase]);
        block.find_valid_nonce().unwrap();
        assert!(validate_block(&block, None, &utxo).is_ok());

        // Wrong linkage
        let mut unlinked = block.clone();
        unlinked.prev_block = vec![9u8; 32];
        unlinked.find_valid_nonce().unwrap();
        assert!(matches!(
            validate_block(&unlinked, None, &utxo),
            Err(ValidationError::BrokenChainLink)
        ));

        // Insufficient work
        let mut weak = block.clone();
        weak.bits = 240;
        assert!(matches!(
            validate_block(&weak, None, &utxo),
            Err(ValidationError::InsufficientProofOfWork { .. })
        ));
    }

    #[test]
    fn test_intra_block_spending_chain() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let utxo = UtxoSet::new();

        // Coinbase and its spend inside the same block
        let coinbase = Transaction::coinbase(100, alice.public_key_hash());
        let spend = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: bob.public_key_hash(),
            }],
        );

        let mut block = Block::new(Block::zero_hash(), 4, vec![coinbase, spend]);
        block.find_valid_nonce().unwrap();
        assert!(validate_block(&block, None, &utxo).is_ok());
    }

    #[test]
    fn test_intra_block_double_spend_rejected() {
        let alice = KeyPair::generate();
        let utxo = UtxoSet::new();

        let coinbase = Transaction::coinbase(100, alice.public_key_hash());
        let spend1 = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: vec![0x01; 32],
            }],
        );
        let spend2 = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: vec![0x02; 32],
            }],
        );

        let mut block = Block::new(Block::zero_hash(), 4, vec![coinbase, spend1, spend2]);
        block.find_valid_nonce().unwrap();

        // The second spend must fail: its outpoint is already consumed
        // by the first one within the same block
        match validate_block(&block, None, &utxo) {
            Err(ValidationError::TransactionRejected { source, .. }) => {
                assert!(matches!(
                    *source,
                    ValidationError::PreviousOutputNotFound(_)
                ));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_committed_double_spend_rejected() {
        let alice = KeyPair::generate();
        let (mut set, coinbase) = funded_set(&alice, 100);

        let spend = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: vec![0x01; 32],
            }],
        );
        assert!(validate_transaction(&spend, &set).is_ok());

        // Commit the first spend, then try to spend the same outpoint again
        set.apply_block(&Block::new(vec![1u8; 32], 0, vec![spend]));
        let again = spend_to(
            &coinbase,
            &alice,
            vec![TxOutput {
                amount: 100,
                locking_script: vec![0x02; 32],
            }],
        );
        assert!(matches!(
            validate_transaction(&again, &set),
            Err(ValidationError::PreviousOutputNotFound(_))
        ));
    }
}
