//! # Peer Transport Service
//!
//! Wires the [`PeerRegistry`] to a [`PeerClient`]. Every peer call runs
//! under a timeout; a failure downgrades the peer to unreachable and comes
//! back as a [`DeliveryOutcome`], never as an error to the broadcaster.

use crate::domain::{HealthInfo, PeerConnection, PeerRegistry, TransportConfig, TransportError};
use crate::ports::{PeerClient, PeerTransportApi};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use shared_types::{
    Address, DeliveryOutcome, DeliveryReport, DeliveryResult, Payload, PeerAddress,
    PeerConnectedPayload, PeerDisconnectedPayload, TimeSource, WireMessage,
};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Peers that answered the probe.
    pub alive: Vec<PeerAddress>,
    /// Peers that did not answer (kept, marked unreachable).
    pub unreachable: Vec<PeerAddress>,
    /// Peers removed for exceeding the liveness timeout.
    pub expired: Vec<PeerAddress>,
}

pub struct PeerTransportService {
    local: HealthInfo,
    node_address: Address,
    client: Arc<dyn PeerClient>,
    registry: RwLock<PeerRegistry>,
    config: TransportConfig,
    time_source: Arc<dyn TimeSource>,
}

impl PeerTransportService {
    pub fn new(
        local_address: PeerAddress,
        node_address: Address,
        client: Arc<dyn PeerClient>,
        config: TransportConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            local: HealthInfo::channel_node(local_address, node_address),
            node_address,
            client,
            registry: RwLock::new(PeerRegistry::new()),
            config,
            time_source,
        }
    }

    /// The address this node advertises.
    pub fn local_address(&self) -> &PeerAddress {
        &self.local.address
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Wrap `payload` in an envelope from this node.
    pub fn message<P: Payload>(&self, payload: &P) -> Result<WireMessage, TransportError> {
        WireMessage::new(payload, self.local.address.clone(), self.time_source.now())
            .map_err(|e| TransportError::Codec(e.to_string()))
    }

    /// Register a peer that announced itself. Returns `true` if it is new.
    pub fn register_peer(
        &self,
        address: PeerAddress,
        node_address: Option<Address>,
        capabilities: Vec<String>,
    ) -> bool {
        if address == self.local.address {
            return false;
        }
        let now = self.time_source.now();
        let added = self
            .registry
            .write()
            .upsert(address.clone(), node_address, capabilities, now);
        if added {
            info!(peer = %address, "[cn-01] peer registered");
        }
        added
    }

    /// Refresh liveness for a peer we just heard from.
    pub fn note_seen(&self, peer: &PeerAddress) -> bool {
        let now = self.time_source.now();
        self.registry.write().mark_seen(peer, now)
    }

    /// Drop a peer without announcing anything.
    pub fn remove_peer(&self, peer: &PeerAddress) -> Option<PeerConnection> {
        let removed = self.registry.write().remove(peer);
        if removed.is_some() {
            info!(peer = %peer, "[cn-01] peer removed");
        }
        removed
    }

    pub fn peer(&self, address: &PeerAddress) -> Option<PeerConnection> {
        self.registry.read().get(address).cloned()
    }

    pub fn reachable_peers(&self) -> Vec<PeerAddress> {
        self.registry.read().reachable()
    }

    /// Earliest-connected live peer; last resort for routing notifications.
    pub fn first_connected(&self) -> Option<PeerAddress> {
        self.registry.read().first_connected()
    }

    pub fn peer_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Probe every known peer and drop those past the liveness timeout.
    pub async fn probe_all(&self) -> ProbeReport {
        let peers: Vec<PeerAddress> = self
            .registry
            .read()
            .all()
            .into_iter()
            .map(|p| p.address)
            .collect();

        let probes = peers.iter().map(|peer| async move {
            let result = timeout(self.config.health_timeout(), self.client.health(peer)).await;
            (peer.clone(), matches!(result, Ok(Ok(_))))
        });
        let results = join_all(probes).await;

        let now = self.time_source.now();
        let mut report = ProbeReport::default();
        let mut registry = self.registry.write();
        for (peer, ok) in results {
            if ok {
                registry.mark_seen(&peer, now);
                report.alive.push(peer);
            } else {
                if registry.mark_unreachable(&peer) {
                    warn!(peer = %peer, "[cn-01] peer failed health probe");
                }
                report.unreachable.push(peer);
            }
        }
        for peer in registry.expired(now, self.config.liveness_timeout_ms) {
            registry.remove(&peer);
            info!(peer = %peer, "[cn-01] peer expired");
            report.expired.push(peer);
        }
        report
    }
}

#[async_trait]
impl PeerTransportApi for PeerTransportService {
    async fn connect(&self, peer: &PeerAddress) -> Result<PeerConnection, TransportError> {
        if *peer == self.local.address {
            return Err(TransportError::Rejected {
                peer: peer.clone(),
                reason: "cannot connect to self".into(),
            });
        }

        let info = timeout(self.config.connect_timeout(), self.client.health(peer))
            .await
            .map_err(|_| TransportError::Timeout {
                peer: peer.clone(),
                after_ms: self.config.connect_timeout_ms,
            })??;

        self.register_peer(peer.clone(), info.node_address, info.capabilities);

        let announce = self.message(&PeerConnectedPayload {
            address: self.local.address.clone(),
            node_address: self.node_address,
            capabilities: self.local.capabilities.clone(),
        })?;
        let outcome = self.send(peer, announce).await;
        if !outcome.is_delivered() {
            warn!(peer = %peer, "[cn-01] handshake announce not delivered");
        }

        self.peer(peer)
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))
    }

    async fn disconnect(&self, peer: &PeerAddress) -> bool {
        if !self.registry.read().contains(peer) {
            return false;
        }
        match self.message(&PeerDisconnectedPayload {
            address: self.local.address.clone(),
        }) {
            Ok(goodbye) => {
                self.send(peer, goodbye).await;
            }
            Err(e) => warn!(error = %e, "[cn-01] could not build disconnect notice"),
        }
        self.remove_peer(peer).is_some()
    }

    async fn send(&self, peer: &PeerAddress, message: WireMessage) -> DeliveryOutcome {
        let message = message.addressed_to(peer.clone());
        let message_id = message.message_id;

        let result = match timeout(
            self.config.request_timeout(),
            self.client.send_message(peer, &message),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Timeout {
                peer: peer.clone(),
                after_ms: self.config.request_timeout_ms,
            }),
        };

        let result = match result {
            Ok(()) => {
                self.note_seen(peer);
                debug!(peer = %peer, kind = %message.kind, message_id = %message_id, "[cn-01] delivered");
                DeliveryResult::Delivered
            }
            Err(e) => {
                self.registry.write().mark_unreachable(peer);
                warn!(peer = %peer, kind = %message.kind, error = %e, "[cn-01] delivery failed");
                DeliveryResult::Failed(e.to_string())
            }
        };

        DeliveryOutcome {
            peer: Some(peer.clone()),
            message_id,
            result,
        }
    }

    async fn broadcast(&self, message: WireMessage) -> DeliveryReport {
        let peers = self.reachable_peers();
        let sends = peers.iter().map(|peer| self.send(peer, message.clone()));
        DeliveryReport {
            outcomes: join_all(sends).await,
        }
    }

    fn peers(&self) -> Vec<PeerConnection> {
        self.registry.read().all()
    }

    fn local_health(&self) -> HealthInfo {
        self.local.clone()
    }
}
