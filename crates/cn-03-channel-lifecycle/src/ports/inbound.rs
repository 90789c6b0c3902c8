//! # Driving Port (Inbound API)
//!
//! Reconciliation entry points used by the message dispatcher. Each one is
//! total: an inapplicable notification yields [`Reconciled::Ignored`],
//! never an error.

use crate::domain::Reconciled;
use async_trait::async_trait;
use shared_types::{
    ChannelAcceptedPayload, ChannelClosedPayload, ChannelClosingPayload, ChannelCreatedPayload,
    ChannelFundedPayload, ChannelId, ChannelProposalPayload, ChannelWithdrawnPayload,
    PaymentPayload, ProposalId,
};

#[async_trait]
pub trait ChannelReconciler: Send + Sync {
    fn reconcile_proposal(&self, payload: &ChannelProposalPayload) -> Reconciled;

    fn reconcile_acceptance(&self, payload: &ChannelAcceptedPayload) -> Reconciled;

    fn reconcile_created(&self, payload: &ChannelCreatedPayload) -> Reconciled;

    /// Confirms the reported state against the ledger before adopting it.
    async fn reconcile_funded(&self, payload: &ChannelFundedPayload) -> Reconciled;

    fn reconcile_payment(&self, payload: &PaymentPayload) -> Reconciled;

    fn reconcile_closing(&self, payload: &ChannelClosingPayload) -> Reconciled;

    fn reconcile_closed(&self, payload: &ChannelClosedPayload) -> Reconciled;

    fn reconcile_withdrawn(&self, payload: &ChannelWithdrawnPayload) -> Reconciled;

    /// Proposal a channel was materialised from, for routing.
    fn proposal_of(&self, channel_id: &ChannelId) -> Option<ProposalId>;

    /// Drop proposals whose counterparty went away. Proposals that already
    /// have a channel are kept. Returns the ones dropped.
    fn discard_proposals(&self, ids: &[ProposalId]) -> Vec<ProposalId>;
}
