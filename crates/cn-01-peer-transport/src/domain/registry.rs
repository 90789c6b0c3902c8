//! # Peer Registry
//!
//! Known peers in connection order. Failure never deletes a peer: it only
//! clears `alive`, so in-flight proposals and channels keep their
//! counterparty. Removal is explicit (`remove`) or by liveness timeout
//! (`expired`).

use super::entities::PeerConnection;
use shared_types::{Address, PeerAddress, Timestamp};
use std::collections::HashMap;

/// Connection-ordered peer table.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerAddress, PeerConnection>,
    order: Vec<PeerAddress>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer or refresh an existing one.
    ///
    /// Returns `true` when the peer was not known before. An existing peer
    /// keeps its `connected_at`; capabilities and node address are only
    /// replaced when the new values are non-empty.
    pub fn upsert(
        &mut self,
        address: PeerAddress,
        node_address: Option<Address>,
        capabilities: Vec<String>,
        now: Timestamp,
    ) -> bool {
        match self.peers.get_mut(&address) {
            Some(peer) => {
                peer.alive = true;
                peer.last_seen = now;
                if node_address.is_some() {
                    peer.node_address = node_address;
                }
                if !capabilities.is_empty() {
                    peer.capabilities = capabilities;
                }
                false
            }
            None => {
                let mut peer = PeerConnection::new(address.clone(), now);
                peer.node_address = node_address;
                peer.capabilities = capabilities;
                self.peers.insert(address.clone(), peer);
                self.order.push(address);
                true
            }
        }
    }

    /// Record a successful exchange. Returns `false` for unknown peers.
    pub fn mark_seen(&mut self, address: &PeerAddress, now: Timestamp) -> bool {
        match self.peers.get_mut(address) {
            Some(peer) => {
                peer.alive = true;
                peer.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Record a failed exchange. Returns `true` if the peer was alive before.
    pub fn mark_unreachable(&mut self, address: &PeerAddress) -> bool {
        match self.peers.get_mut(address) {
            Some(peer) => std::mem::replace(&mut peer.alive, false),
            None => false,
        }
    }

    pub fn remove(&mut self, address: &PeerAddress) -> Option<PeerConnection> {
        let removed = self.peers.remove(address)?;
        self.order.retain(|a| a != address);
        Some(removed)
    }

    pub fn get(&self, address: &PeerAddress) -> Option<&PeerConnection> {
        self.peers.get(address)
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.peers.contains_key(address)
    }

    /// Every peer, in connection order.
    pub fn all(&self) -> Vec<PeerConnection> {
        self.order
            .iter()
            .filter_map(|a| self.peers.get(a))
            .cloned()
            .collect()
    }

    /// Addresses of peers currently marked alive, in connection order.
    pub fn reachable(&self) -> Vec<PeerAddress> {
        self.order
            .iter()
            .filter(|a| self.peers.get(*a).is_some_and(|p| p.alive))
            .cloned()
            .collect()
    }

    /// The earliest-connected peer that is still alive.
    pub fn first_connected(&self) -> Option<PeerAddress> {
        self.order
            .iter()
            .find(|a| self.peers.get(*a).is_some_and(|p| p.alive))
            .cloned()
    }

    /// Peers not seen for longer than `liveness_timeout_ms`.
    pub fn expired(&self, now: Timestamp, liveness_timeout_ms: u64) -> Vec<PeerAddress> {
        self.order
            .iter()
            .filter(|a| {
                self.peers
                    .get(*a)
                    .is_some_and(|p| now.saturating_since(p.last_seen) > liveness_timeout_ms)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
