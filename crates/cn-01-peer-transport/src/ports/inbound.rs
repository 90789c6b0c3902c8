//! # Driving Port (Inbound API)
//!
//! Operations the node runtime drives on the transport.

use crate::domain::{HealthInfo, PeerConnection, TransportError};
use async_trait::async_trait;
use shared_types::{DeliveryOutcome, DeliveryReport, PeerAddress, WireMessage};

#[async_trait]
pub trait PeerTransportApi: Send + Sync {
    /// Handshake with `peer`: probe its health, register it and announce
    /// ourselves with `PEER_CONNECTED`.
    async fn connect(&self, peer: &PeerAddress) -> Result<PeerConnection, TransportError>;

    /// Announce `PEER_DISCONNECTED` (best effort) and drop the peer.
    /// Idempotent: returns `false` if the peer was not known.
    async fn disconnect(&self, peer: &PeerAddress) -> bool;

    /// Send one envelope to one peer. Failures are reported, not raised.
    async fn send(&self, peer: &PeerAddress, message: WireMessage) -> DeliveryOutcome;

    /// Send one envelope to every reachable peer.
    async fn broadcast(&self, message: WireMessage) -> DeliveryReport;

    /// Every known peer, in connection order.
    fn peers(&self) -> Vec<PeerConnection>;

    /// Our own identity as served to probes.
    fn local_health(&self) -> HealthInfo;
}
