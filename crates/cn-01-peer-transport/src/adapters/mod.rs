//! Adapters for the peer transport.

pub mod memory;

#[cfg(feature = "http")]
pub mod http_client;
#[cfg(feature = "http")]
pub mod http_server;

pub use memory::InMemoryPeerNetwork;

#[cfg(feature = "http")]
pub use http_client::HttpPeerClient;
#[cfg(feature = "http")]
pub use http_server::http_router;
