//! Channel proposals.

use super::errors::ChannelError;
use serde::Serialize;
use shared_types::amount::decimal;
use shared_types::{Address, Amount, ChannelId, ProposalId, Timestamp};
use std::fmt;

/// Proposal negotiation status. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Proposed,
    Accepted,
    /// Settlement contract deployed; the channel exists.
    Created,
}

impl ProposalStatus {
    /// Single-step transition allowed to a local operation.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Accepted) | (Self::Accepted, Self::Created)
        )
    }

    /// Not yet backed by a channel; eligible for garbage collection.
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Created)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Proposed => "PROPOSED",
            Self::Accepted => "ACCEPTED",
            Self::Created => "CREATED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    /// Becomes partA.
    pub proposer: Address,
    /// Becomes partB.
    pub acceptor: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub status: ProposalStatus,
    pub created_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
    /// Set once the proposal is CREATED.
    pub channel_id: Option<ChannelId>,
}

impl Proposal {
    pub fn new(
        id: ProposalId,
        proposer: Address,
        acceptor: Address,
        amount: Amount,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            proposer,
            acceptor,
            amount,
            status: ProposalStatus::Proposed,
            created_at,
            accepted_at: None,
            channel_id: None,
        }
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        self.proposer == *address || self.acceptor == *address
    }

    /// Take exactly one step forward.
    pub fn transition_to(&mut self, next: ProposalStatus) -> Result<(), ChannelError> {
        if !self.status.can_transition_to(next) {
            return Err(ChannelError::InvalidState {
                operation: "proposal transition",
                expected: format!("a status before {next}"),
                actual: self.status.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Move to `next` if it is ahead of the current status. Returns whether
    /// anything changed.
    pub fn advance_to(&mut self, next: ProposalStatus) -> bool {
        if self.status < next {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn accept(&mut self, at: Timestamp) -> Result<(), ChannelError> {
        self.transition_to(ProposalStatus::Accepted)?;
        self.accepted_at = Some(at);
        Ok(())
    }

    /// Record the channel that materialised this proposal.
    pub fn mark_created(&mut self, channel_id: ChannelId) {
        self.advance_to(ProposalStatus::Created);
        self.channel_id = Some(channel_id);
    }
}
