//! Ports for the peer transport.

pub mod inbound;
pub mod outbound;

pub use inbound::PeerTransportApi;
pub use outbound::{InboundHandler, PeerClient};
