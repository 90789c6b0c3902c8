//! # Resolver Service
//!
//! Thread-safe front for [`ResolverIndex`] plus the "last inbound peer"
//! fallback used when a proposal has no mapping.

use crate::domain::{Direction, ProposalPeerMapping, ResolverIndex};
use parking_lot::RwLock;
use shared_types::{PeerAddress, ProposalId, TimeSource};
use std::sync::Arc;
use tracing::{debug, info};

/// Which rule produced a routing answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Mapping,
    LastInbound,
    FirstConnected,
}

/// A resolved notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub peer: PeerAddress,
    pub source: RouteSource,
}

pub struct ProposalResolver {
    index: RwLock<ResolverIndex>,
    last_inbound: RwLock<Option<PeerAddress>>,
    time_source: Arc<dyn TimeSource>,
}

impl ProposalResolver {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            index: RwLock::new(ResolverIndex::new()),
            last_inbound: RwLock::new(None),
            time_source,
        }
    }

    pub fn register(&self, proposal: ProposalId, peer: PeerAddress, direction: Direction) {
        debug!(proposal_id = %proposal, peer = %peer, %direction, "[cn-02] mapping registered");
        let now = self.time_source.now();
        self.index.write().register(proposal, peer, direction, now);
    }

    /// Refresh the mapping from a message about `proposal` sent by `peer`.
    pub fn observe(&self, proposal: ProposalId, peer: PeerAddress) -> ProposalPeerMapping {
        let now = self.time_source.now();
        let mapping = self.index.write().observe(proposal, peer, now);
        if mapping.direction == Direction::Bidirectional {
            info!(proposal_id = %proposal, peer = %mapping.peer, "[cn-02] mapping now bidirectional");
        }
        mapping
    }

    pub fn resolve(&self, proposal: &ProposalId) -> Option<ProposalPeerMapping> {
        self.index.read().resolve(proposal).cloned()
    }

    /// Remember the sender of the latest inbound message.
    pub fn note_inbound(&self, peer: &PeerAddress) {
        *self.last_inbound.write() = Some(peer.clone());
    }

    pub fn last_inbound(&self) -> Option<PeerAddress> {
        self.last_inbound.read().clone()
    }

    /// Pick the peer to notify about `proposal`, falling back from the
    /// mapping to the last inbound peer to `first_connected`.
    pub fn resolve_target(
        &self,
        proposal: &ProposalId,
        first_connected: Option<PeerAddress>,
    ) -> Option<Resolution> {
        if let Some(mapping) = self.resolve(proposal) {
            return Some(Resolution {
                peer: mapping.peer,
                source: RouteSource::Mapping,
            });
        }
        if let Some(peer) = self.last_inbound() {
            return Some(Resolution {
                peer,
                source: RouteSource::LastInbound,
            });
        }
        first_connected.map(|peer| Resolution {
            peer,
            source: RouteSource::FirstConnected,
        })
    }

    /// Forget everything routed through `peer`. Returns the proposals whose
    /// mapping was removed so the caller can purge unmaterialised ones.
    pub fn cleanup(&self, peer: &PeerAddress) -> Vec<ProposalId> {
        let removed = self.index.write().remove_peer(peer);
        {
            let mut last = self.last_inbound.write();
            if last.as_ref() == Some(peer) {
                *last = None;
            }
        }
        if !removed.is_empty() {
            info!(peer = %peer, count = removed.len(), "[cn-02] mappings cleaned up");
        }
        removed
    }

    pub fn remove(&self, proposal: &ProposalId) -> Option<ProposalPeerMapping> {
        self.index.write().remove(proposal)
    }

    pub fn mapping_count(&self) -> usize {
        self.index.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ManualTimeSource;

    fn addr(name: &str) -> PeerAddress {
        PeerAddress::parse(&format!("mem://{name}")).unwrap()
    }

    fn resolver() -> ProposalResolver {
        ProposalResolver::new(Arc::new(ManualTimeSource::new(0)))
    }

    #[test]
    fn test_fallback_order() {
        let r = resolver();
        let p = ProposalId::generate();

        assert_eq!(r.resolve_target(&p, None), None);
        assert_eq!(
            r.resolve_target(&p, Some(addr("first"))).unwrap().source,
            RouteSource::FirstConnected
        );

        r.note_inbound(&addr("recent"));
        let hit = r.resolve_target(&p, Some(addr("first"))).unwrap();
        assert_eq!(hit.peer, addr("recent"));
        assert_eq!(hit.source, RouteSource::LastInbound);

        r.register(p, addr("mapped"), Direction::Outgoing);
        let hit = r.resolve_target(&p, Some(addr("first"))).unwrap();
        assert_eq!(hit.peer, addr("mapped"));
        assert_eq!(hit.source, RouteSource::Mapping);
    }

    #[test]
    fn test_cleanup_forgets_last_inbound_of_that_peer() {
        let r = resolver();
        let p = ProposalId::generate();
        r.register(p, addr("x"), Direction::Incoming);
        r.note_inbound(&addr("x"));

        assert_eq!(r.cleanup(&addr("x")), vec![p]);
        assert_eq!(r.last_inbound(), None);
        assert_eq!(r.mapping_count(), 0);
        assert!(r.cleanup(&addr("x")).is_empty());
    }

    #[test]
    fn test_observe_through_service() {
        let r = resolver();
        let p = ProposalId::generate();
        r.register(p, addr("x"), Direction::Outgoing);
        assert_eq!(r.observe(p, addr("x")).direction, Direction::Outgoing);
        let mapping = r.observe(p, addr("y"));
        assert_eq!(mapping.direction, Direction::Bidirectional);
        assert_eq!(r.resolve(&p).unwrap().peer, addr("y"));
    }
}
