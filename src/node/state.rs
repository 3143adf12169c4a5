//! Node state machine
//!
//! Owns the chain, mempool, UTXO set, and mining flag as one shared
//! state object behind a single exclusive lock, so the chain tip, the
//! mempool snapshot, and the ledger are always observed consistently.
//! Message handlers and the mining worker hold the lock only for short
//! critical sections; the proof-of-work loop runs on a private copy of
//! the drained mempool with no lock held.

use crate::core::{validate_block, validate_transaction, Block, Transaction, UtxoSet};
use crate::node::message::{Response, TransactionEnvelope, WireMessage};
use crate::storage::{Storage, StorageError};
use parking_lot::Mutex;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default difficulty: required leading zero bits of a block hash
pub const DEFAULT_DIFFICULTY: u32 = 12;

/// Node startup errors. Anything after startup is turned into a wire
/// response instead.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Node configuration, fixed at startup
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the TCP server listens on
    pub listen_addr: String,
    /// Peer addresses mined blocks are broadcast to
    pub peers: Vec<String>,
    /// Directory holding the chain and UTXO files
    pub data_dir: PathBuf,
    /// Difficulty for locally mined blocks
    pub difficulty: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".to_string(),
            peers: Vec::new(),
            data_dir: PathBuf::from(".picochain_data"),
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

/// The mutable collections guarded together by the node's lock
struct ChainState {
    chain: Vec<Block>,
    mempool: Vec<Transaction>,
    utxo: UtxoSet,
    /// True while a proof-of-work search is in flight
    mining: bool,
}

impl ChainState {
    fn tip_hash(&self) -> Option<Vec<u8>> {
        self.chain.last().map(|b| b.hash())
    }
}

/// The node: message dispatch, shared state, persistence
pub struct Node {
    config: NodeConfig,
    storage: Storage,
    state: Mutex<ChainState>,
    mine_signal: mpsc::Sender<()>,
}

impl Node {
    /// Load persisted state and build the node. Returns the receiver
    /// end of the mining signal channel for the mining worker.
    pub fn new(config: NodeConfig) -> Result<(Self, mpsc::Receiver<()>), NodeError> {
        let storage = Storage::new(&config.data_dir)?;
        let chain = storage.load_chain()?;

        let utxo = match storage.load_utxos() {
            Ok(utxo) => utxo,
            Err(e) => {
                log::info!("No usable UTXO set file ({}), rebuilding from blockchain", e);
                let utxo = UtxoSet::rebuild_from_chain(&chain);
                if let Err(e) = storage.save_utxos(&utxo) {
                    log::warn!("Failed to persist rebuilt UTXO set: {}", e);
                }
                utxo
            }
        };

        // Capacity 1: signals coalesce while a round is in flight
        let (mine_signal, mine_rx) = mpsc::channel(1);

        let node = Self {
            config,
            storage,
            state: Mutex::new(ChainState {
                chain,
                mempool: Vec::new(),
                utxo,
                mining: false,
            }),
            mine_signal,
        };

        Ok((node, mine_rx))
    }

    /// Peer addresses for block broadcast
    pub fn peers(&self) -> &[String] {
        &self.config.peers
    }

    /// Address the server should listen on
    pub fn listen_addr(&self) -> &str {
        &self.config.listen_addr
    }

    // =========================================================================
    // Message dispatch
    // =========================================================================

    /// Process one inbound protocol line and produce the response line.
    /// Parsing and validation errors never escape as panics or crashes;
    /// they become `ERROR:` responses.
    pub fn dispatch(&self, line: &str) -> Response {
        match WireMessage::parse(line) {
            Ok(WireMessage::Transaction(envelope)) => self.handle_transaction(envelope),
            Ok(WireMessage::Block(envelope)) => self.handle_block(envelope.block),
            Err(e) => Response::Error(e.to_string()),
        }
    }

    /// Validate a transaction against committed UTXO state and queue it
    /// for mining
    fn handle_transaction(&self, envelope: TransactionEnvelope) -> Response {
        // The envelope's legacy public_keys field is ignored: each
        // input carries its own key.
        let tx = envelope.transaction;
        let txid = tx.id();
        log::info!("Processing transaction: {}", txid);

        {
            let mut state = self.state.lock();
            if let Err(e) = validate_transaction(&tx, &state.utxo) {
                log::warn!("Transaction {} rejected: {}", txid, e);
                return Response::Error(format!("Transaction validation failed: {}", e));
            }
            state.mempool.push(tx);
        }

        log::info!("Transaction added to mempool: {}", txid);
        self.signal_miner();

        Response::Success(format!("Transaction {} added to mempool", txid))
    }

    /// Validate a received block and append it to the chain
    fn handle_block(&self, block: Block) -> Response {
        log::info!("Received block with {} transactions", block.tx_count());

        let mut state = self.state.lock();
        if let Err(e) = validate_block(&block, state.tip_hash().as_deref(), &state.utxo) {
            log::warn!("Block {} rejected: {}", block.hash_hex(), e);
            return Response::Error(format!("Block validation failed: {}", e));
        }

        state.utxo.apply_block(&block);
        state.chain.push(block);
        self.persist(&state);

        let tip = state.chain.last().map(|b| b.hash_hex()).unwrap_or_default();
        log::info!("Block accepted and added to blockchain: {}", tip);

        Response::Success("Block accepted and added to blockchain".to_string())
    }

    // =========================================================================
    // Mining coordination
    // =========================================================================

    /// Fire-and-forget mining trigger; coalesces while a round runs
    pub fn signal_miner(&self) {
        let _ = self.mine_signal.try_send(());
    }

    /// Try to start a mining round: test-and-set the mining flag, drain
    /// the mempool, and capture the chain tip, all under one lock
    /// acquisition. Returns the unmined candidate block, or `None` if a
    /// round is already in flight or there is nothing to mine.
    pub fn begin_mining_round(&self) -> Option<Block> {
        let mut state = self.state.lock();
        if state.mining || state.mempool.is_empty() {
            return None;
        }
        state.mining = true;

        let transactions = std::mem::take(&mut state.mempool);
        let prev_block = state.tip_hash().unwrap_or_else(Block::zero_hash);
        drop(state);

        log::info!("Starting mining with {} transactions", transactions.len());
        Some(Block::new(prev_block, self.config.difficulty, transactions))
    }

    /// Commit a successfully mined block: append, apply to the ledger,
    /// persist, and leave the mining state. Broadcast happens outside
    /// this lock, in the mining worker.
    pub fn commit_mined_block(&self, block: Block) {
        let mut state = self.state.lock();
        state.utxo.apply_block(&block);
        state.chain.push(block);
        state.mining = false;
        self.persist(&state);
    }

    /// Abandon a mining round whose nonce search was exhausted. The
    /// drained transactions are dropped, mirroring the behavior this
    /// design inherits; returning them to the mempool is a known
    /// correctness gap.
    pub fn abort_mining_round(&self, dropped: usize) {
        log::error!(
            "Mining failed: nonce space exhausted, dropping {} transactions",
            dropped
        );
        self.state.lock().mining = false;
    }

    /// Whole-structure overwrite of both persisted files, under the
    /// exclusive lock. Failures are logged; in-memory state stays
    /// authoritative until the next successful write.
    fn persist(&self, state: &ChainState) {
        if let Err(e) = self.storage.save_chain(&state.chain) {
            log::error!("Failed to save blockchain: {}", e);
        }
        if let Err(e) = self.storage.save_utxos(&state.utxo) {
            log::error!("Failed to save UTXO set: {}", e);
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of blocks in the chain
    pub fn chain_height(&self) -> usize {
        self.state.lock().chain.len()
    }

    /// Hash of the current chain tip, if any
    pub fn tip_hash(&self) -> Option<Vec<u8>> {
        self.state.lock().tip_hash()
    }

    /// Number of pending transactions
    pub fn mempool_len(&self) -> usize {
        self.state.lock().mempool.len()
    }

    /// Whether a mining round is in flight
    pub fn is_mining(&self) -> bool {
        self.state.lock().mining
    }

    /// Number of spendable outputs
    pub fn utxo_len(&self) -> usize {
        self.state.lock().utxo.len()
    }

    /// Spendable output for an outpoint key, if any
    pub fn utxo_lookup(&self, outpoint: &str) -> Option<crate::core::TxOutput> {
        self.state.lock().utxo.lookup(outpoint).cloned()
    }

    /// Value currently spendable by a locking script
    pub fn balance_of(&self, locking_script: &[u8]) -> u64 {
        self.state.lock().utxo.balance_of(locking_script)
    }
}
