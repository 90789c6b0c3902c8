//! # channel-node
//!
//! Runs one payment-channel node: peer endpoint, bootstrap connections and
//! the maintenance loop, until Ctrl-C.
//!
//! The settlement ledger is process-local. Two nodes only share channel
//! state on the ledger when they run in the same process (see the tests
//! crate); a standalone node still exchanges every notification over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cn_01_peer_transport::HttpPeerClient;
use cn_03_channel_lifecycle::{LocalKeySigner, SimulatedLedger, StateSigner};
use node_runtime::logging::init_logging;
use node_runtime::{ChannelNode, NodeComponents, NodeConfig, NodeRuntime};
use shared_types::SystemTimeSource;

#[derive(Debug, Parser)]
#[command(name = "channel-node", version, about = "Two-party payment channel node")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "CN_CONFIG")]
    config: Option<PathBuf>,

    /// Socket to bind the peer endpoint on.
    #[arg(long)]
    listen: Option<String>,

    /// Address other nodes reach this one at.
    #[arg(long)]
    advertise: Option<String>,

    /// Bootstrap peer; may be repeated.
    #[arg(long = "peer")]
    peers: Vec<String>,
}

fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = NodeConfig::load(args.config.as_deref())?;
    config.apply_env()?;
    if let Some(listen) = &args.listen {
        config.network.listen_addr = listen.clone();
    }
    if let Some(advertise) = &args.advertise {
        config.network.advertised_addr = advertise.clone();
    }
    if !args.peers.is_empty() {
        config.network.bootstrap_peers = args.peers.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_node(config: &NodeConfig) -> Result<ChannelNode> {
    let signer = match &config.keys.secret_key {
        Some(secret) => LocalKeySigner::from_hex(secret).context("invalid keys.secret_key")?,
        None => {
            warn!("[node] no secret key configured, using an ephemeral key");
            LocalKeySigner::random()
        }
    };

    let ledger = Arc::new(SimulatedLedger::new(config.channel.challenge_period));
    warn!("[node] settlement runs on a process-local simulated ledger");

    Ok(ChannelNode::new(
        NodeComponents {
            advertised: config.advertised_address()?,
            client: Arc::new(HttpPeerClient::new(&config.transport)?),
            settlement: Arc::new(ledger.account(signer.address())),
            signer: Arc::new(signer),
            time_source: Arc::new(SystemTimeSource),
        },
        config,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging)?;

    let node = Arc::new(build_node(&config)?);
    let runtime = NodeRuntime::new(node, config);
    runtime.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    runtime.shutdown().await;
    info!("[node] bye");
    Ok(())
}
