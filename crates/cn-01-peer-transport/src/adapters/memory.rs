//! # In-Memory Peer Network
//!
//! A loopback hub that delivers envelopes straight into the registered
//! node's [`InboundHandler`]. Used by tests and local simulations.
//!
//! Fault injection:
//! - `set_unreachable`: sends and probes fail with `Unreachable`
//! - `drop_next`: the next N messages to a peer are lost (`Timeout`)
//! - `duplicate_next`: the next N messages to a peer are delivered twice
//! - `set_latency`: every delivery sleeps first

use crate::domain::{HealthInfo, TransportError};
use crate::ports::{InboundHandler, PeerClient};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{PeerAddress, WireMessage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct Faults {
    unreachable: HashSet<PeerAddress>,
    drop_next: HashMap<PeerAddress, usize>,
    duplicate_next: HashMap<PeerAddress, usize>,
    latency: Option<Duration>,
}

/// Shared in-process network. Every node uses the same `Arc` as its
/// [`PeerClient`].
#[derive(Default)]
pub struct InMemoryPeerNetwork {
    endpoints: RwLock<HashMap<PeerAddress, Arc<dyn InboundHandler>>>,
    faults: RwLock<Faults>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl InMemoryPeerNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handler` reachable at `address`.
    pub fn attach(&self, address: PeerAddress, handler: Arc<dyn InboundHandler>) {
        self.endpoints.write().insert(address, handler);
    }

    /// Remove the endpoint at `address`. Later sends fail as unreachable.
    pub fn detach(&self, address: &PeerAddress) {
        self.endpoints.write().remove(address);
    }

    pub fn set_unreachable(&self, address: &PeerAddress, unreachable: bool) {
        let mut faults = self.faults.write();
        if unreachable {
            faults.unreachable.insert(address.clone());
        } else {
            faults.unreachable.remove(address);
        }
    }

    /// Lose the next `count` messages addressed to `address`.
    pub fn drop_next(&self, address: &PeerAddress, count: usize) {
        self.faults.write().drop_next.insert(address.clone(), count);
    }

    /// Deliver the next `count` messages addressed to `address` twice.
    pub fn duplicate_next(&self, address: &PeerAddress, count: usize) {
        self.faults
            .write()
            .duplicate_next
            .insert(address.clone(), count);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.write().latency = latency;
    }

    /// Number of envelopes handed to a handler (duplicates count twice).
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of envelopes lost by `drop_next`.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn endpoint(&self, peer: &PeerAddress) -> Result<Arc<dyn InboundHandler>, TransportError> {
        if self.faults.read().unreachable.contains(peer) {
            return Err(TransportError::Unreachable {
                peer: peer.clone(),
                reason: "connection refused".into(),
            });
        }
        self.endpoints
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable {
                peer: peer.clone(),
                reason: "no endpoint".into(),
            })
    }

    fn take_fault(counts: &mut HashMap<PeerAddress, usize>, peer: &PeerAddress) -> bool {
        match counts.get_mut(peer) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PeerClient for InMemoryPeerNetwork {
    async fn send_message(
        &self,
        peer: &PeerAddress,
        message: &WireMessage,
    ) -> Result<(), TransportError> {
        let handler = self.endpoint(peer)?;

        let (latency, drop, duplicate) = {
            let mut faults = self.faults.write();
            let drop = Self::take_fault(&mut faults.drop_next, peer);
            let duplicate = !drop && Self::take_fault(&mut faults.duplicate_next, peer);
            (faults.latency, drop, duplicate)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if drop {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(peer = %peer, message_id = %message.message_id, "[cn-01] memnet dropped message");
            return Err(TransportError::Timeout {
                peer: peer.clone(),
                after_ms: latency.map(|l| l.as_millis() as u64).unwrap_or_default(),
            });
        }

        let copies = if duplicate { 2 } else { 1 };
        for _ in 0..copies {
            handler.on_message(message.clone()).await;
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn health(&self, peer: &PeerAddress) -> Result<HealthInfo, TransportError> {
        let handler = self.endpoint(peer)?;
        Ok(handler.health())
    }
}
