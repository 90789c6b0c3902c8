//! Lifecycle handlers. Each hands its payload to the reconciler, then
//! refreshes the proposal route from the sender if the entity is one this
//! node tracks.

use crate::domain::DispatchOutcome;
use crate::service::MessageDispatcher;
use cn_03_channel_lifecycle::{IgnoreReason, Reconciled};
use shared_types::{
    ChannelAcceptedPayload, ChannelClosedPayload, ChannelClosingPayload, ChannelCreatedPayload,
    ChannelFundedPayload, ChannelId, ChannelProposalPayload, ChannelWithdrawnPayload,
    PaymentPayload, PeerAddress, ProposalId,
};

/// Whether the outcome concerns an entity tracked here.
fn tracked(outcome: &Reconciled) -> bool {
    matches!(
        outcome,
        Reconciled::Applied | Reconciled::Ignored(IgnoreReason::Duplicate | IgnoreReason::Stale)
    )
}

impl MessageDispatcher {
    fn observe_proposal(
        &self,
        proposal: ProposalId,
        from: &PeerAddress,
        outcome: Reconciled,
    ) -> DispatchOutcome {
        if tracked(&outcome) {
            self.resolver.observe(proposal, from.clone());
        }
        DispatchOutcome::Reconciled(outcome)
    }

    fn observe_channel(
        &self,
        channel: &ChannelId,
        from: &PeerAddress,
        outcome: Reconciled,
    ) -> DispatchOutcome {
        if tracked(&outcome) {
            if let Some(proposal) = self.reconciler.proposal_of(channel) {
                self.resolver.observe(proposal, from.clone());
            }
        }
        DispatchOutcome::Reconciled(outcome)
    }

    pub(super) fn on_proposal(
        &self,
        from: &PeerAddress,
        payload: ChannelProposalPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_proposal(&payload);
        self.observe_proposal(payload.proposal_id, from, outcome)
    }

    pub(super) fn on_accepted(
        &self,
        from: &PeerAddress,
        payload: ChannelAcceptedPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_acceptance(&payload);
        self.observe_proposal(payload.proposal_id, from, outcome)
    }

    pub(super) fn on_created(
        &self,
        from: &PeerAddress,
        payload: ChannelCreatedPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_created(&payload);
        self.observe_proposal(payload.proposal_id, from, outcome)
    }

    pub(super) async fn on_funded(
        &self,
        from: &PeerAddress,
        payload: ChannelFundedPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_funded(&payload).await;
        self.observe_channel(&payload.channel_id, from, outcome)
    }

    pub(super) fn on_payment(
        &self,
        from: &PeerAddress,
        payload: PaymentPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_payment(&payload);
        self.observe_channel(&payload.channel_id, from, outcome)
    }

    pub(super) fn on_closing(
        &self,
        from: &PeerAddress,
        payload: ChannelClosingPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_closing(&payload);
        self.observe_channel(&payload.channel_id, from, outcome)
    }

    pub(super) fn on_closed(
        &self,
        from: &PeerAddress,
        payload: ChannelClosedPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_closed(&payload);
        self.observe_channel(&payload.channel_id, from, outcome)
    }

    pub(super) fn on_withdrawn(
        &self,
        from: &PeerAddress,
        payload: ChannelWithdrawnPayload,
    ) -> DispatchOutcome {
        let outcome = self.reconciler.reconcile_withdrawn(&payload);
        self.observe_channel(&payload.channel_id, from, outcome)
    }
}
