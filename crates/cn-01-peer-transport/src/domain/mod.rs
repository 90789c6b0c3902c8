//! Domain layer for the peer transport.

pub mod config;
pub mod entities;
pub mod errors;
pub mod registry;

pub use config::TransportConfig;
pub use entities::{HealthInfo, PeerConnection, CHANNEL_CAPABILITIES, SERVICE_NAME};
pub use errors::TransportError;
pub use registry::PeerRegistry;
