//! Transport errors.

use shared_types::PeerAddress;
use thiserror::Error;

/// Why a peer call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response within the configured timeout.
    #[error("request to {peer} timed out after {after_ms}ms")]
    Timeout { peer: PeerAddress, after_ms: u64 },

    /// Connection could not be established.
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: PeerAddress, reason: String },

    /// Peer is not in the registry.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerAddress),

    /// Peer answered with a non-success status.
    #[error("peer {peer} rejected request: {reason}")]
    Rejected { peer: PeerAddress, reason: String },

    /// Body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}
