//! Picochain node binary
//!
//! Starts the TCP server, the mining worker, and block gossip with the
//! configured peers.

use clap::Parser;
use picochain::node::{self, Node, NodeConfig, DEFAULT_DIFFICULTY};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "picochain")]
#[command(version = "0.1.0")]
#[command(about = "A minimal proof-of-work blockchain node", long_about = None)]
struct Cli {
    /// Address to listen on for transactions and blocks
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    listen: String,

    /// Peer address to broadcast mined blocks to (repeatable)
    #[arg(short, long = "peer")]
    peers: Vec<String>,

    /// Data directory for blockchain storage
    #[arg(short, long, default_value = ".picochain_data")]
    data_dir: PathBuf,

    /// Mining difficulty (number of leading zero bits)
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    for peer in &cli.peers {
        log::info!("Added peer server: {}", peer);
    }

    let config = NodeConfig {
        listen_addr: cli.listen,
        peers: cli.peers,
        data_dir: cli.data_dir,
        difficulty: cli.difficulty,
    };

    let (node, mine_rx) = match Node::new(config) {
        Ok(built) => built,
        Err(e) => {
            log::error!("Failed to start node: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = node::run(Arc::new(node), mine_rx).await {
        log::error!("Server error: {}", e);
        process::exit(1);
    }
}
