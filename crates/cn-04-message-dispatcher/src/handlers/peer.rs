//! `PEER_*` handlers. The payload names the subject node, which must be the
//! sender itself.

use crate::domain::{DispatchOutcome, PeerEvent};
use crate::service::MessageDispatcher;
use shared_types::{PeerAddress, PeerConnectedPayload, PeerDisconnectedPayload};
use tracing::{info, warn};

fn refuse(kind: &'static str, from: &PeerAddress, claimed: PeerAddress) -> DispatchOutcome {
    warn!(from = %from, claimed = %claimed, "[cn-04] {kind} for another node refused");
    DispatchOutcome::Peer(PeerEvent::Refused {
        from: from.clone(),
        claimed,
    })
}

impl MessageDispatcher {
    pub(super) fn on_peer_connected(
        &self,
        from: &PeerAddress,
        payload: PeerConnectedPayload,
    ) -> DispatchOutcome {
        if payload.address != *from {
            return refuse("peer announce", from, payload.address);
        }
        let new = self.transport.register_peer(
            payload.address.clone(),
            Some(payload.node_address),
            payload.capabilities,
        );
        info!(peer = %payload.address, node = %payload.node_address, new, "[cn-04] peer announced");
        DispatchOutcome::Peer(PeerEvent::Connected {
            peer: payload.address,
            new,
        })
    }

    /// Remove the peer, its routes, and the proposals that were only
    /// reachable through it.
    pub(super) fn on_peer_disconnected(
        &self,
        from: &PeerAddress,
        payload: PeerDisconnectedPayload,
    ) -> DispatchOutcome {
        if payload.address != *from {
            return refuse("disconnect notice", from, payload.address);
        }
        let peer = payload.address;
        self.transport.remove_peer(&peer);
        let orphaned = self.resolver.cleanup(&peer);
        let purged = self.reconciler.discard_proposals(&orphaned);
        info!(peer = %peer, purged = purged.len(), "[cn-04] peer left");
        DispatchOutcome::Peer(PeerEvent::Disconnected { peer, purged })
    }
}
