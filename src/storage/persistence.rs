//! Chain and UTXO persistence layer
//!
//! The node's durable state is two independent JSON documents: the
//! chain file (ordered array of blocks) and the UTXO file (outpoint to
//! output map). Both are fully rewritten on every successful mutation,
//! via a temporary file and an atomic rename so a crash mid-write
//! cannot leave a truncated document behind.

use crate::core::{Block, UtxoSet};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default chain file name
pub const CHAIN_FILE: &str = "blockchain.json";

/// Default UTXO file name
pub const UTXO_FILE: &str = "utxos.json";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Persists the chain and UTXO files under a data directory
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a storage manager, creating the data directory if needed
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn chain_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_FILE)
    }

    fn utxo_path(&self) -> PathBuf {
        self.data_dir.join(UTXO_FILE)
    }

    fn write_atomic<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let file = fs::File::create(&temp_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, value)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Save the whole chain to disk
    pub fn save_chain(&self, chain: &[Block]) -> Result<(), StorageError> {
        self.write_atomic(&self.chain_path(), &chain)?;
        log::debug!("Chain saved to disk ({} blocks)", chain.len());
        Ok(())
    }

    /// Load the chain from disk. A missing file yields an empty chain.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let path = self.chain_path();
        if !path.exists() {
            log::info!("No existing blockchain found, starting fresh");
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path)?;
        let chain: Vec<Block> = serde_json::from_reader(BufReader::new(file))?;
        log::info!("Loaded blockchain with {} blocks", chain.len());
        Ok(chain)
    }

    /// Save the whole UTXO set to disk
    pub fn save_utxos(&self, utxos: &UtxoSet) -> Result<(), StorageError> {
        self.write_atomic(&self.utxo_path(), utxos)?;
        log::debug!("UTXO set saved to disk ({} entries)", utxos.len());
        Ok(())
    }

    /// Load the UTXO set from disk. Failure is non-fatal for the node:
    /// the caller rebuilds the set from the chain instead.
    pub fn load_utxos(&self) -> Result<UtxoSet, StorageError> {
        let file = fs::File::open(self.utxo_path())?;
        let utxos: UtxoSet = serde_json::from_reader(BufReader::new(file))?;
        log::info!("UTXO set loaded ({} entries)", utxos.len());
        Ok(utxos)
    }
}
