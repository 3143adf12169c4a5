//! TCP server, connection handling, mining worker, and block gossip
//!
//! One task per inbound connection reads newline-framed messages and
//! dispatches them into the node state machine in arrival order. A
//! single dedicated mining worker waits on the coalescing signal
//! channel and drives at most one proof-of-work search at a time, on a
//! blocking thread so the runtime keeps serving connections.

use crate::node::message::BlockEnvelope;
use crate::node::state::Node;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::codec::{Framed, LinesCodec};

/// Bind the listener, start the mining worker, and serve connections
/// until the process exits. Failing to bind is the one fatal error.
pub async fn run(node: Arc<Node>, mine_rx: mpsc::Receiver<()>) -> io::Result<()> {
    let listener = TcpListener::bind(node.listen_addr()).await?;
    log::info!("Server listening on {}", node.listen_addr());

    tokio::spawn(run_miner(Arc::clone(&node), mine_rx));

    loop {
        let (stream, addr) = listener.accept().await?;
        log::debug!("Connection from {}", addr);
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(node, stream).await {
                log::warn!("Connection {} closed with error: {}", addr, e);
            }
        });
    }
}

/// Serve one connection: read a line, dispatch it, answer with a line.
/// Messages from a single connection are processed strictly in order.
async fn handle_connection(node: Arc<Node>, stream: TcpStream) -> io::Result<()> {
    let mut framed = Framed::new(stream, LinesCodec::new());

    while let Some(line) = framed.next().await {
        let line = line.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        log::debug!("Received: {}", line);

        // Dispatch on the blocking pool: validation is CPU work and
        // block acceptance writes the persisted files
        let handler = Arc::clone(&node);
        let response = task::spawn_blocking(move || handler.dispatch(&line))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        framed
            .send(response.to_string())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
    }

    log::debug!("Client disconnected");
    Ok(())
}

/// The dedicated mining worker. Each signal starts at most one round;
/// after a round resolves it re-checks the mempool, so transactions
/// that arrived during the search get mined next without waiting for
/// another signal.
async fn run_miner(node: Arc<Node>, mut mine_rx: mpsc::Receiver<()>) {
    while mine_rx.recv().await.is_some() {
        loop {
            let Some(candidate) = node.begin_mining_round() else {
                break;
            };

            let start = Instant::now();
            let solved = task::spawn_blocking(move || {
                let mut block = candidate;
                let nonce = block.find_valid_nonce();
                (block, nonce)
            })
            .await;

            let (block, nonce) = match solved {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Mining task panicked: {}", e);
                    node.abort_mining_round(0);
                    break;
                }
            };

            match nonce {
                Some(nonce) => {
                    log::info!(
                        "Block mined! Nonce: {}, time: {:?}, hash: {}",
                        nonce,
                        start.elapsed(),
                        block.hash_hex()
                    );
                    let committer = Arc::clone(&node);
                    let committed = block.clone();
                    let commit = task::spawn_blocking(move || {
                        committer.commit_mined_block(committed);
                    })
                    .await;
                    if let Err(e) = commit {
                        log::error!("Commit task panicked: {}", e);
                        break;
                    }

                    // State is committed; a slow peer cannot hold it up
                    broadcast_block(&node, block);
                }
                None => {
                    node.abort_mining_round(block.tx_count());
                }
            }
        }
    }
}

/// Gossip a mined block to every configured peer, one fire-and-forget
/// task each. Per-peer failures are logged and isolated.
pub fn broadcast_block(node: &Node, block: crate::core::Block) {
    let peers = node.peers();
    if peers.is_empty() {
        log::debug!("No peer servers configured for broadcasting");
        return;
    }

    let line = match BlockEnvelope::new(block).to_line() {
        Ok(line) => line,
        Err(e) => {
            log::error!("Failed to encode block for broadcast: {}", e);
            return;
        }
    };

    for peer in peers {
        let peer = peer.clone();
        let line = line.clone();
        tokio::spawn(async move {
            match send_line(&peer, &line).await {
                Ok(()) => log::info!("Block broadcasted to peer: {}", peer),
                Err(e) => log::warn!("Failed to send block to peer {}: {}", peer, e),
            }
        });
    }
}

async fn send_line(addr: &str, line: &str) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::node::message::{TransactionEnvelope, TRANSACTION_TAG};
    use crate::node::state::NodeConfig;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn spawn_node(dir: &TempDir) -> (Arc<Node>, String) {
        let config = NodeConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            peers: Vec::new(),
            data_dir: dir.path().to_path_buf(),
            difficulty: 8,
        };
        let (node, mine_rx) = Node::new(config).unwrap();
        let node = Arc::new(node);

        // Bind manually to learn the ephemeral port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server_node = Arc::clone(&node);
        tokio::spawn(async move {
            tokio::spawn(run_miner(Arc::clone(&server_node), mine_rx));
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let node = Arc::clone(&server_node);
                tokio::spawn(handle_connection(node, stream));
            }
        });

        (node, addr)
    }

    async fn request(addr: &str, line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader.read_line(&mut response).await.unwrap();
        response.trim_end().to_string()
    }

    #[tokio::test]
    async fn test_transaction_over_tcp_gets_mined() {
        let dir = TempDir::new().unwrap();
        let (node, addr) = spawn_node(&dir).await;

        let tx = Transaction::coinbase(1_000_000, vec![0xAA; 32]);
        let line = format!(
            "{}{}",
            TRANSACTION_TAG,
            serde_json::to_string(&TransactionEnvelope {
                transaction: tx.clone(),
                public_keys: Vec::new(),
            })
            .unwrap()
        );

        let response = request(&addr, &line).await;
        assert!(response.starts_with("SUCCESS:"), "{}", response);
        assert!(response.contains(&tx.id()));

        // The mining worker picks the transaction up shortly after
        for _ in 0..100 {
            if node.chain_height() == 1 && !node.is_mining() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(node.chain_height(), 1);
        assert_eq!(node.utxo_len(), 1);
    }

    #[tokio::test]
    async fn test_mined_block_is_broadcast_to_peer() {
        use crate::node::message::BLOCK_TAG;
        use std::time::Duration;

        // Peer side: accept one connection and read one line
        let peer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer_listener.local_addr().unwrap().to_string();
        let received = tokio::spawn(async move {
            let (stream, _) = peer_listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            line
        });

        let dir = TempDir::new().unwrap();
        let config = NodeConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            peers: vec![peer_addr],
            data_dir: dir.path().to_path_buf(),
            difficulty: 8,
        };
        let (node, mine_rx) = Node::new(config).unwrap();
        let node = Arc::new(node);
        tokio::spawn(run_miner(Arc::clone(&node), mine_rx));

        let tx = Transaction::coinbase(5, vec![0x01; 32]);
        let line = format!(
            "{}{}",
            TRANSACTION_TAG,
            serde_json::to_string(&TransactionEnvelope {
                transaction: tx,
                public_keys: Vec::new(),
            })
            .unwrap()
        );
        assert!(node.dispatch(&line).is_success());

        let gossiped = tokio::time::timeout(Duration::from_secs(30), received)
            .await
            .expect("peer never received the block")
            .unwrap();
        assert!(gossiped.starts_with(BLOCK_TAG));
    }

    #[tokio::test]
    async fn test_unknown_tag_over_tcp() {
        let dir = TempDir::new().unwrap();
        let (_node, addr) = spawn_node(&dir).await;

        let response = request(&addr, "NONSENSE:{}").await;
        assert!(response.starts_with("ERROR: Unknown message format"));
    }
}
