//! # Driven Ports (Outbound SPI)
//!
//! What the transport needs from its host: a way to put an envelope on the
//! wire, and somewhere to hand envelopes that arrive.

use crate::domain::{HealthInfo, TransportError};
use async_trait::async_trait;
use shared_types::{PeerAddress, WireMessage};

/// Point-to-point delivery of one envelope per call.
///
/// `Ok(())` means the peer acknowledged *receipt*; it says nothing about
/// whether the peer could apply the message.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Deliver `message` to `peer`.
    async fn send_message(
        &self,
        peer: &PeerAddress,
        message: &WireMessage,
    ) -> Result<(), TransportError>;

    /// Liveness probe returning the peer's identity.
    async fn health(&self, peer: &PeerAddress) -> Result<HealthInfo, TransportError>;
}

/// Receiver side of the wire: the node's dispatcher implements this.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Handle a received envelope. Never fails: the wire response is a
    /// receipt acknowledgement only.
    async fn on_message(&self, message: WireMessage);

    /// Identity served to health probes.
    fn health(&self) -> HealthInfo;
}
