//! Wire protocol messages
//!
//! The protocol is newline-delimited UTF-8 lines of the form
//! `TAG:<json>`, answered with a single `SUCCESS: ...` or
//! `ERROR: ...` line. The tag is decoded into a typed variant rather
//! than threaded around as a string prefix.

use crate::core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Line prefix announcing a transaction
pub const TRANSACTION_TAG: &str = "TRANSACTION:";

/// Line prefix announcing a block
pub const BLOCK_TAG: &str = "BLOCK:";

/// Message parsing errors
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Unknown message format. Use TRANSACTION:<json> or BLOCK:<json>")]
    UnknownFormat,
    #[error("Invalid transaction message JSON: {0}")]
    InvalidTransactionJson(serde_json::Error),
    #[error("Invalid block message JSON: {0}")]
    InvalidBlockJson(serde_json::Error),
}

/// Transaction announcement payload.
/// `public_keys` is a legacy field kept for wire compatibility;
/// validation reads the key from each input instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub transaction: Transaction,
    #[serde(default)]
    pub public_keys: Vec<serde_json::Value>,
}

/// Block announcement payload, with the same legacy key field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEnvelope {
    pub block: Block,
    #[serde(default)]
    pub public_keys: Vec<serde_json::Value>,
}

impl BlockEnvelope {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            public_keys: Vec::new(),
        }
    }

    /// Encode as a protocol line (without the trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}{}", BLOCK_TAG, serde_json::to_string(self)?))
    }
}

/// A decoded inbound protocol line
#[derive(Debug, Clone)]
pub enum WireMessage {
    Transaction(TransactionEnvelope),
    Block(BlockEnvelope),
}

impl WireMessage {
    /// Parse one protocol line into a typed message
    pub fn parse(line: &str) -> Result<Self, MessageError> {
        let line = line.trim();
        if let Some(json) = line.strip_prefix(TRANSACTION_TAG) {
            let envelope =
                serde_json::from_str(json).map_err(MessageError::InvalidTransactionJson)?;
            Ok(WireMessage::Transaction(envelope))
        } else if let Some(json) = line.strip_prefix(BLOCK_TAG) {
            let envelope = serde_json::from_str(json).map_err(MessageError::InvalidBlockJson)?;
            Ok(WireMessage::Block(envelope))
        } else {
            Err(MessageError::UnknownFormat)
        }
    }

    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::Transaction(_) => "Transaction",
            WireMessage::Block(_) => "Block",
        }
    }
}

/// The single-line reply to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(String),
    Error(String),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success(msg) => write!(f, "SUCCESS: {}", msg),
            Response::Error(msg) => write!(f, "ERROR: {}", msg),
        }
    }
}
