//! Mapping entries.

use serde::{Deserialize, Serialize};
use shared_types::{PeerAddress, Timestamp};
use std::fmt;

/// Who started the conversation about a proposal, as seen locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// We proposed; the peer is the designated acceptor.
    Outgoing,
    /// The peer proposed to us.
    Incoming,
    /// The proposal has been heard from more than one peer address.
    Bidirectional,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
            Direction::Bidirectional => "bidirectional",
        };
        f.write_str(name)
    }
}

/// Current counterparty of one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPeerMapping {
    pub peer: PeerAddress,
    pub direction: Direction,
    /// Last time the mapping was registered or refreshed.
    pub timestamp: Timestamp,
}
