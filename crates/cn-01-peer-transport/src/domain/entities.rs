//! Peer connection records and the health probe body.

use serde::{Deserialize, Serialize};
use shared_types::{Address, PeerAddress, Timestamp};

/// Service identity returned by `GET /health`.
pub const SERVICE_NAME: &str = "channel-node";

/// Capabilities every channel node announces.
pub const CHANNEL_CAPABILITIES: [&str; 3] = ["channels", "payments", "settlement"];

/// Response body of the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    /// Always [`SERVICE_NAME`] for a channel node.
    pub service: String,
    /// Network address the node advertises.
    pub address: PeerAddress,
    /// Ledger account of the node, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_address: Option<Address>,
    /// Capability list.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl HealthInfo {
    /// Health body for a channel node with the standard capability set.
    pub fn channel_node(address: PeerAddress, node_address: Address) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            address,
            node_address: Some(node_address),
            capabilities: CHANNEL_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A known peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnection {
    pub address: PeerAddress,
    /// False after a failed send or probe. Cleared by the next success.
    pub alive: bool,
    pub connected_at: Timestamp,
    pub last_seen: Timestamp,
    pub capabilities: Vec<String>,
    /// Ledger account announced by the peer.
    pub node_address: Option<Address>,
}

impl PeerConnection {
    pub fn new(address: PeerAddress, now: Timestamp) -> Self {
        Self {
            address,
            alive: true,
            connected_at: now,
            last_seen: now,
            capabilities: Vec::new(),
            node_address: None,
        }
    }
}
