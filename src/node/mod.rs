//! Node orchestration
//!
//! Message dispatch, the shared chain/mempool/UTXO state machine, the
//! TCP server, the mining worker, and block gossip to peers.

pub mod message;
pub mod server;
pub mod state;

pub use message::{
    BlockEnvelope, MessageError, Response, TransactionEnvelope, WireMessage, BLOCK_TAG,
    TRANSACTION_TAG,
};
pub use server::{broadcast_block, run};
pub use state::{Node, NodeConfig, NodeError, DEFAULT_DIFFICULTY};
