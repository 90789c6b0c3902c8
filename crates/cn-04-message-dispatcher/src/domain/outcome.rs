use cn_03_channel_lifecycle::Reconciled;
use serde::Serialize;
use shared_types::{PeerAddress, ProposalId};

/// What dispatching one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Message id already in the window; nothing was done.
    Duplicate,
    /// A `PEER_*` message, applied to the registry or refused.
    Peer(PeerEvent),
    /// A lifecycle message went to the reconciler.
    Reconciled(Reconciled),
}

impl DispatchOutcome {
    /// Whether local state changed.
    pub fn is_applied(&self) -> bool {
        match self {
            Self::Duplicate => false,
            Self::Peer(PeerEvent::Refused { .. }) => false,
            Self::Peer(_) => true,
            Self::Reconciled(r) => r.is_applied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Connected {
        peer: PeerAddress,
        /// False when the peer was already known.
        new: bool,
    },
    Disconnected {
        peer: PeerAddress,
        /// Unmaterialised proposals dropped with the peer.
        purged: Vec<ProposalId>,
    },
    /// The notice named a node other than its sender; nothing changed.
    Refused {
        from: PeerAddress,
        claimed: PeerAddress,
    },
}

/// Dispatcher counters for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStats {
    pub received: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub window_len: usize,
    pub window_capacity: usize,
}
