//! # Node Runtime
//!
//! Owns the background tasks of a running node and their shutdown signal.
//!
//! ## Startup Sequence
//!
//! 1. Bind and serve the peer endpoint
//! 2. Connect to bootstrap peers (failures are logged, not fatal)
//! 3. Start the maintenance loop
//!
//! Shutdown says goodbye to every connected peer, then stops both tasks.

use crate::config::NodeConfig;
use crate::maintenance::spawn_maintenance;
use crate::node::ChannelNode;
use crate::server::{bind, spawn_server};
use anyhow::Result;
use parking_lot::Mutex;
use shared_types::PeerAddress;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct NodeRuntime {
    node: Arc<ChannelNode>,
    config: NodeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub fn new(node: Arc<ChannelNode>, config: NodeConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            node,
            config,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn node(&self) -> &Arc<ChannelNode> {
        &self.node
    }

    /// Start serving. Returns the bound socket of the peer endpoint.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = bind(self.config.listen_socket()?).await?;
        let bound = listener.local_addr()?;
        let server = spawn_server(
            listener,
            self.node.inbound_handler(),
            self.shutdown_rx.clone(),
        );

        self.connect_bootstrap_peers().await;

        let maintenance = spawn_maintenance(
            Arc::clone(&self.node),
            self.config.transport.probe_interval(),
            self.shutdown_rx.clone(),
        );
        self.tasks.lock().extend([server, maintenance]);

        info!(
            listen = %bound,
            advertised = %self.node.peer_address(),
            node_address = %self.node.node_address(),
            "[node] channel node running"
        );
        Ok(bound)
    }

    async fn connect_bootstrap_peers(&self) {
        for raw in &self.config.network.bootstrap_peers {
            let peer = match PeerAddress::parse(raw) {
                Ok(peer) => peer,
                Err(e) => {
                    warn!(peer = %raw, error = %e, "[node] skipping bootstrap peer");
                    continue;
                }
            };
            match self.node.connect_peer(&peer).await {
                Ok(conn) => info!(peer = %conn.address, "[node] bootstrap peer connected"),
                Err(e) => warn!(peer = %peer, error = %e, "[node] bootstrap peer unavailable"),
            }
        }
    }

    /// Disconnect from every peer and stop the background tasks.
    pub async fn shutdown(&self) {
        info!("[node] shutting down");
        for peer in self.node.peers() {
            self.node.disconnect_peer(&peer.address).await;
        }

        if let Err(e) = self.shutdown_tx.send(true) {
            error!(error = %e, "[node] failed to send shutdown signal");
        }
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "[node] background task panicked");
            }
        }
    }
}
