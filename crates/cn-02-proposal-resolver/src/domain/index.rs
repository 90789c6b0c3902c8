//! # Two-Way Index
//!
//! `proposal -> mapping` and `peer -> {proposals}`. Every mutation goes
//! through this type so both sides always change together.

use super::mapping::{Direction, ProposalPeerMapping};
use shared_types::{PeerAddress, ProposalId, Timestamp};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ResolverIndex {
    by_proposal: HashMap<ProposalId, ProposalPeerMapping>,
    by_peer: HashMap<PeerAddress, HashSet<ProposalId>>,
}

impl ResolverIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mapping for `proposal`, replacing any previous one.
    pub fn register(
        &mut self,
        proposal: ProposalId,
        peer: PeerAddress,
        direction: Direction,
        now: Timestamp,
    ) {
        self.unlink(&proposal);
        self.link(
            proposal,
            ProposalPeerMapping {
                peer,
                direction,
                timestamp: now,
            },
        );
    }

    /// Record that a message about `proposal` arrived from `peer`.
    ///
    /// - no mapping: registered as `Incoming`
    /// - same peer: timestamp refreshed, direction kept
    /// - different peer: upgraded to `Bidirectional` and repointed at `peer`
    ///   (the most recent sender wins)
    ///
    /// Returns the resulting mapping.
    pub fn observe(
        &mut self,
        proposal: ProposalId,
        peer: PeerAddress,
        now: Timestamp,
    ) -> ProposalPeerMapping {
        let direction = match self.by_proposal.get_mut(&proposal) {
            None => Direction::Incoming,
            Some(existing) if existing.peer == peer => {
                existing.timestamp = now;
                return existing.clone();
            }
            Some(_) => Direction::Bidirectional,
        };
        let mapping = ProposalPeerMapping {
            peer,
            direction,
            timestamp: now,
        };
        self.unlink(&proposal);
        self.link(proposal, mapping.clone());
        mapping
    }

    pub fn resolve(&self, proposal: &ProposalId) -> Option<&ProposalPeerMapping> {
        self.by_proposal.get(proposal)
    }

    /// Remove one proposal's mapping.
    pub fn remove(&mut self, proposal: &ProposalId) -> Option<ProposalPeerMapping> {
        self.unlink(proposal)
    }

    /// Remove every mapping pointing at `peer`, returning their proposals.
    pub fn remove_peer(&mut self, peer: &PeerAddress) -> Vec<ProposalId> {
        let proposals: Vec<ProposalId> = self
            .by_peer
            .remove(peer)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for proposal in &proposals {
            self.by_proposal.remove(proposal);
        }
        proposals
    }

    pub fn proposals_for(&self, peer: &PeerAddress) -> Vec<ProposalId> {
        self.by_peer
            .get(peer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_proposal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_proposal.is_empty()
    }

    fn link(&mut self, proposal: ProposalId, mapping: ProposalPeerMapping) {
        self.by_peer
            .entry(mapping.peer.clone())
            .or_default()
            .insert(proposal);
        self.by_proposal.insert(proposal, mapping);
    }

    fn unlink(&mut self, proposal: &ProposalId) -> Option<ProposalPeerMapping> {
        let mapping = self.by_proposal.remove(proposal)?;
        if let Some(set) = self.by_peer.get_mut(&mapping.peer) {
            set.remove(proposal);
            if set.is_empty() {
                self.by_peer.remove(&mapping.peer);
            }
        }
        Some(mapping)
    }

    /// Both indexes describe the same set of links.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let forward = self
            .by_proposal
            .iter()
            .all(|(p, m)| self.by_peer.get(&m.peer).is_some_and(|s| s.contains(p)));
        let reverse = self.by_peer.iter().all(|(peer, set)| {
            !set.is_empty()
                && set
                    .iter()
                    .all(|p| self.by_proposal.get(p).is_some_and(|m| &m.peer == peer))
        });
        forward && reverse
    }
}
