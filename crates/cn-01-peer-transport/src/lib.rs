//! # Peer Registry & Transport
//!
//! **Subsystem ID:** 1
//!
//! Tracks the nodes this node talks to and moves `WireMessage` envelopes
//! between them, one message per request.
//!
//! ## Architecture
//!
//! - **Domain Layer:** peer registry, liveness bookkeeping, errors, config
//! - **Ports Layer:** `PeerClient` (outbound wire), `InboundHandler` (where
//!   received messages go), `PeerTransportApi` (what the node drives)
//! - **Service Layer:** `PeerTransportService`, timeouts and per-peer
//!   delivery reporting
//! - **Adapters Layer:** `InMemoryPeerNetwork` for tests and HTTP
//!   client/server (feature `http`)
//!
//! ## Delivery Semantics
//!
//! Sends never fail the caller. A failed or timed-out send marks the peer
//! unreachable (it is not removed) and is reported as a
//! [`shared_types::DeliveryOutcome`]. Peers are removed only on explicit
//! disconnect or after the liveness timeout.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryPeerNetwork;
pub use domain::{
    HealthInfo, PeerConnection, PeerRegistry, TransportConfig, TransportError, CHANNEL_CAPABILITIES,
    SERVICE_NAME,
};
pub use ports::{InboundHandler, PeerClient, PeerTransportApi};
pub use service::{PeerTransportService, ProbeReport};

#[cfg(feature = "http")]
pub use adapters::{http_router, HttpPeerClient};
