//! # Peer Endpoint
//!
//! Serves the HTTP wire binding until the shutdown signal flips.

use anyhow::{Context, Result};
use cn_01_peer_transport::{http_router, InboundHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Bind the peer endpoint. Done before spawning so a taken port fails startup.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind peer endpoint on {addr}"))
}

pub fn spawn_server(
    listener: TcpListener,
    handler: Arc<dyn InboundHandler>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let local = listener.local_addr().ok();
        info!(addr = ?local, "[node] peer endpoint listening");

        let result = axum::serve(listener, http_router(handler))
            .with_graceful_shutdown(async move {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;

        match result {
            Ok(()) => info!("[node] peer endpoint stopped"),
            Err(e) => error!(error = %e, "[node] peer endpoint failed"),
        }
    })
}
