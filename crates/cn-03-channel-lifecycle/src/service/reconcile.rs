//! Applying peer notifications. Every handler is idempotent: replays and
//! out-of-order deliveries are ignored, never applied twice.

use super::{ChannelLifecycleService, EntityKey};
use crate::domain::invariants::{invariant_conservation, invariant_nonce_advances};
use crate::domain::signature::recover_state_signer;
use crate::domain::{Channel, IgnoreReason, Proposal, ProposalStatus, Reconciled};
use crate::ports::ChannelReconciler;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    ChannelAcceptedPayload, ChannelClosedPayload, ChannelClosingPayload, ChannelCreatedPayload,
    ChannelFundedPayload, ChannelId, ChannelProposalPayload, ChannelState,
    ChannelWithdrawnPayload, PaymentOrigin, PaymentPayload, ProposalId, Timestamp,
};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

fn ignore(message: &'static str, entity: impl fmt::Display, reason: IgnoreReason) -> Reconciled {
    warn!(%entity, %reason, "[cn-03] {message} ignored");
    Reconciled::Ignored(reason)
}

fn invalid(message: &'static str, entity: impl fmt::Display, why: impl Into<String>) -> Reconciled {
    ignore(message, entity, IgnoreReason::Invalid(why.into()))
}

/// Move `channel` one lifecycle step to `next`. Notices that repeat, lag or
/// skip ahead of the local state are refused; a skipped step is only
/// recoverable from the ledger.
fn step_to(channel: &mut Channel, next: ChannelState, now: Timestamp) -> Result<(), IgnoreReason> {
    if channel.state == next {
        return Err(IgnoreReason::Duplicate);
    }
    if !channel.state.is_behind(next) {
        return Err(IgnoreReason::Stale);
    }
    channel.transition_to(next, now).map_err(|_| {
        IgnoreReason::Invalid(format!("{next} does not follow {}", channel.state))
    })
}

#[async_trait]
impl ChannelReconciler for ChannelLifecycleService {
    fn reconcile_proposal(&self, payload: &ChannelProposalPayload) -> Reconciled {
        const MSG: &str = "proposal";
        let id = payload.proposal_id;
        if payload.acceptor != self.local_address() {
            return ignore(MSG, id, IgnoreReason::NotParticipant);
        }
        if payload.amount.is_zero() {
            return invalid(MSG, id, "zero amount");
        }
        if payload.proposer == payload.acceptor {
            return invalid(MSG, id, "proposer is acceptor");
        }

        let mut proposals = self.proposals.write();
        if proposals.contains_key(&id) {
            return ignore(MSG, id, IgnoreReason::Duplicate);
        }
        let proposal = Proposal::new(
            id,
            payload.proposer,
            payload.acceptor,
            payload.amount,
            payload.created_at,
        );
        proposals.insert(id, Arc::new(Mutex::new(proposal)));

        info!(proposal_id = %id, proposer = %payload.proposer, amount = %payload.amount, "[cn-03] proposal received");
        Reconciled::Applied
    }

    fn reconcile_acceptance(&self, payload: &ChannelAcceptedPayload) -> Reconciled {
        const MSG: &str = "acceptance";
        let id = payload.proposal_id;
        let Ok(entry) = self.proposal_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };
        let mut proposal = entry.lock();
        if proposal.acceptor != payload.acceptor {
            return invalid(MSG, id, "not the designated acceptor");
        }
        if proposal.status != ProposalStatus::Proposed {
            return ignore(MSG, id, IgnoreReason::Stale);
        }
        if let Err(e) = proposal.accept(payload.accepted_at) {
            return invalid(MSG, id, e.to_string());
        }

        info!(proposal_id = %id, "[cn-03] proposal accepted by peer");
        Reconciled::Applied
    }

    fn reconcile_created(&self, payload: &ChannelCreatedPayload) -> Reconciled {
        const MSG: &str = "channel created";
        let id = payload.channel_id;
        let local = self.local_address();
        if payload.part_a != local && payload.part_b != local {
            return ignore(MSG, id, IgnoreReason::NotParticipant);
        }
        if payload.part_a == payload.part_b || payload.amount.is_zero() {
            return invalid(MSG, id, "malformed channel");
        }
        if invariant_conservation(payload.balance_a, payload.balance_b, payload.amount).is_err() {
            return invalid(MSG, id, "balances do not conserve amount");
        }

        let now = self.time_source.now();
        let mut channel = Channel::new(
            id,
            payload.proposal_id,
            payload.contract_address,
            payload.part_a,
            payload.part_b,
            payload.amount,
            now,
        );
        if let Err(e) = channel.adopt_balances(payload.balance_a, payload.balance_b, now) {
            return invalid(MSG, id, e.to_string());
        }

        {
            let mut channels = self.channels.write();
            if channels.contains_key(&id) {
                return ignore(MSG, id, IgnoreReason::Duplicate);
            }
            channels.insert(id, Arc::new(Mutex::new(channel)));
        }
        if let Ok(entry) = self.proposal_entry(&payload.proposal_id) {
            entry.lock().mark_created(id);
        }

        info!(
            channel_id = %id,
            proposal_id = %payload.proposal_id,
            contract = %payload.contract_address,
            "[cn-03] channel created by peer"
        );
        Reconciled::Applied
    }

    async fn reconcile_funded(&self, payload: &ChannelFundedPayload) -> Reconciled {
        const MSG: &str = "funding";
        let id = payload.channel_id;
        let Ok(entry) = self.channel_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };

        let (contract, behind) = {
            let mut channel = entry.lock();
            let Some(role) = channel.participant(&payload.participant) else {
                return invalid(MSG, id, "funder is not a participant");
            };
            let behind = channel.state.is_behind(payload.state);
            if channel.is_funded_by(role) && !behind {
                return ignore(MSG, id, IgnoreReason::Duplicate);
            }
            channel.set_funded(role, self.time_source.now());
            (channel.contract_address, behind)
        };

        // The sender's view of the ledger is a hint; only the ledger itself
        // moves our state.
        if behind {
            match self.settlement.read_state(contract).await {
                Ok(ledger) => {
                    let mut channel = entry.lock();
                    if channel.adopt_state(ledger.state, self.time_source.now()) {
                        info!(channel_id = %id, state = %channel.state, "[cn-03] ledger state adopted");
                    }
                }
                Err(e) => {
                    warn!(channel_id = %id, error = %e, "[cn-03] ledger read after peer funding failed");
                }
            }
        }

        info!(channel_id = %id, participant = %payload.participant, "[cn-03] peer funded channel");
        Reconciled::Applied
    }

    fn reconcile_payment(&self, payload: &PaymentPayload) -> Reconciled {
        const MSG: &str = "payment";
        let id = payload.channel_id;
        let record = &payload.payment;
        let Ok(entry) = self.channel_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };
        let mut channel = entry.lock();

        if channel.state != ChannelState::Active {
            return ignore(MSG, id, IgnoreReason::Stale);
        }
        // A close in flight has already signed the state it submits.
        if self.is_busy(&EntityKey::Channel(id)) {
            return ignore(MSG, id, IgnoreReason::Stale);
        }
        if !invariant_nonce_advances(channel.nonce, record.nonce) {
            return ignore(MSG, id, IgnoreReason::Stale);
        }
        let (Some(sender), Some(recipient)) = (
            channel.participant(&record.sender),
            channel.participant(&record.recipient),
        ) else {
            return invalid(MSG, id, "sender or recipient is not a participant");
        };
        if sender == recipient {
            return invalid(MSG, id, "sender is recipient");
        }
        if invariant_conservation(record.balance_a, record.balance_b, channel.amount).is_err() {
            return invalid(MSG, id, "balances do not conserve amount");
        }
        match recover_state_signer(record.nonce, record.balance_a, record.balance_b, &record.signature) {
            Ok(signer) if signer == record.sender => {}
            Ok(_) => return invalid(MSG, id, "signature is not the sender's"),
            Err(e) => return invalid(MSG, id, e.to_string()),
        }

        let mut record = record.clone();
        record.origin = PaymentOrigin::Remote;
        let nonce = record.nonce;
        if let Err(e) = channel.apply_payment(record, self.time_source.now()) {
            return invalid(MSG, id, e.to_string());
        }

        info!(channel_id = %id, nonce, "[cn-03] payment received");
        Reconciled::Applied
    }

    fn reconcile_closing(&self, payload: &ChannelClosingPayload) -> Reconciled {
        const MSG: &str = "closing";
        let id = payload.channel_id;
        let Ok(entry) = self.channel_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };
        let mut channel = entry.lock();
        let now = self.time_source.now();
        if let Err(reason) = step_to(&mut channel, ChannelState::Closing, now) {
            return ignore(MSG, id, reason);
        }
        channel.closing_block = Some(payload.closing_block);

        let conserves =
            invariant_conservation(payload.balance_a, payload.balance_b, channel.amount).is_ok();
        if payload.nonce >= channel.nonce && conserves {
            channel.nonce = payload.nonce;
            if let Err(e) = channel.adopt_balances(payload.balance_a, payload.balance_b, now) {
                warn!(channel_id = %id, error = %e, "[cn-03] closing balances not adopted");
            }
        } else {
            warn!(
                channel_id = %id,
                submitted = payload.nonce,
                local = channel.nonce,
                "[cn-03] counterparty closed with an older state"
            );
        }

        info!(channel_id = %id, block = payload.closing_block, "[cn-03] channel closing by peer");
        Reconciled::Applied
    }

    fn reconcile_closed(&self, payload: &ChannelClosedPayload) -> Reconciled {
        const MSG: &str = "closed";
        let id = payload.channel_id;
        let Ok(entry) = self.channel_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };
        let mut channel = entry.lock();
        let now = self.time_source.now();
        if let Err(reason) = step_to(&mut channel, ChannelState::Closed, now) {
            return ignore(MSG, id, reason);
        }
        if invariant_conservation(payload.balance_a, payload.balance_b, channel.amount).is_ok() {
            if let Err(e) = channel.adopt_balances(payload.balance_a, payload.balance_b, now) {
                warn!(channel_id = %id, error = %e, "[cn-03] closed balances not adopted");
            }
        }

        info!(channel_id = %id, "[cn-03] channel closed by peer");
        Reconciled::Applied
    }

    fn reconcile_withdrawn(&self, payload: &ChannelWithdrawnPayload) -> Reconciled {
        const MSG: &str = "withdrawal";
        let id = payload.channel_id;
        let Ok(entry) = self.channel_entry(&id) else {
            return ignore(MSG, id, IgnoreReason::UnknownEntity);
        };
        let mut channel = entry.lock();
        if channel.participant(&payload.withdrawer).is_none() {
            return invalid(MSG, id, "withdrawer is not a participant");
        }
        if let Err(reason) = step_to(&mut channel, ChannelState::Closed, self.time_source.now()) {
            return ignore(MSG, id, reason);
        }

        info!(channel_id = %id, tx = %payload.transaction_hash, "[cn-03] channel withdrawn by peer");
        Reconciled::Applied
    }

    fn proposal_of(&self, channel_id: &ChannelId) -> Option<ProposalId> {
        Some(self.channel_entry(channel_id).ok()?.lock().proposal_id)
    }

    fn discard_proposals(&self, ids: &[ProposalId]) -> Vec<ProposalId> {
        self.purge_proposals(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::domain::{IgnoreReason, ProposalStatus, Reconciled};
    use crate::ports::ChannelReconciler;
    use shared_types::{
        Address, ChannelAcceptedPayload, ChannelClosedPayload, ChannelClosingPayload,
        ChannelFundedPayload,
        ChannelState, ChannelWithdrawnPayload, PaymentOrigin, PaymentPayload, Timestamp,
    };

    #[test]
    fn test_proposal_for_someone_else_is_ignored() {
        let pair = Pair::new();
        let mut payload = pair.proposal_payload(10);
        payload.acceptor = Address::new([0x42; 20]);
        assert_eq!(
            pair.bob.reconcile_proposal(&payload),
            Reconciled::Ignored(IgnoreReason::NotParticipant)
        );
        assert_eq!(pair.bob.stats().proposals, 0);
    }

    #[test]
    fn test_duplicate_proposal_is_ignored() {
        let pair = Pair::new();
        let payload = pair.proposal_payload(10);
        assert!(pair.bob.reconcile_proposal(&payload).is_applied());
        assert_eq!(
            pair.bob.reconcile_proposal(&payload),
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
        assert_eq!(pair.bob.stats().proposals, 1);
    }

    #[test]
    fn test_acceptance_checks_acceptor_and_status() {
        let pair = Pair::new();
        let proposal = pair
            .alice
            .create_proposal(pair.bob_address(), amount(10))
            .unwrap();

        let forged = ChannelAcceptedPayload {
            proposal_id: proposal.id,
            acceptor: Address::new([0x42; 20]),
            accepted_at: Timestamp(5),
        };
        assert!(matches!(
            pair.alice.reconcile_acceptance(&forged),
            Reconciled::Ignored(IgnoreReason::Invalid(_))
        ));

        let genuine = ChannelAcceptedPayload {
            acceptor: pair.bob_address(),
            ..forged
        };
        assert!(pair.alice.reconcile_acceptance(&genuine).is_applied());
        assert_eq!(
            pair.alice.reconcile_acceptance(&genuine),
            Reconciled::Ignored(IgnoreReason::Stale)
        );
        let stored = pair.alice.get_proposal(&proposal.id).unwrap();
        assert_eq!(stored.status, ProposalStatus::Accepted);
        assert_eq!(stored.accepted_at, Some(Timestamp(5)));
    }

    #[tokio::test]
    async fn test_created_mirrors_channel_and_marks_proposal() {
        let pair = Pair::new();
        let channel_id = pair.created_channel(10).await;

        let mine = pair.alice.get_channel(&channel_id).unwrap();
        let theirs = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(mine.contract_address, theirs.contract_address);
        assert_eq!((theirs.balance_a, theirs.balance_b), (amount(5), amount(5)));
        assert_eq!(
            pair.bob.get_proposal(&mine.proposal_id).unwrap().status,
            ProposalStatus::Created
        );
        assert_eq!(pair.bob.proposal_of(&channel_id), Some(mine.proposal_id));

        let replay = pair.created_payload(&channel_id);
        assert_eq!(
            pair.bob.reconcile_created(&replay),
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_funded_notification_confirms_against_ledger() {
        let pair = Pair::new();
        let channel_id = pair.created_channel(10).await;
        pair.alice.fund(&channel_id, pair.alice_address()).await.unwrap();

        // Claims ACTIVE, but Bob has not deposited yet.
        let premature = ChannelFundedPayload {
            channel_id,
            participant: pair.alice_address(),
            state: ChannelState::Active,
            both_funded: false,
        };
        assert!(pair.bob.reconcile_funded(&premature).await.is_applied());
        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert!(channel.funded_a);
        assert_eq!(channel.state, ChannelState::Empty);

        pair.bob.fund(&channel_id, pair.bob_address()).await.unwrap();
        let report = ChannelFundedPayload {
            channel_id,
            participant: pair.bob_address(),
            state: ChannelState::Active,
            both_funded: true,
        };
        assert!(pair.alice.reconcile_funded(&report).await.is_applied());
        assert_eq!(
            pair.alice.get_channel(&channel_id).unwrap().state,
            ChannelState::Active
        );
        assert_eq!(
            pair.alice.reconcile_funded(&report).await,
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_payment_applied_once_and_stale_rejected() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;

        let first = pair.alice.pay(&channel_id, amount(2)).unwrap();
        let second = pair.alice.pay(&channel_id, amount(1)).unwrap();

        let deliver = |record: &shared_types::PaymentRecord| {
            pair.bob.reconcile_payment(&PaymentPayload {
                channel_id,
                payment: record.clone(),
            })
        };
        assert!(deliver(&second).is_applied());
        assert_eq!(deliver(&first), Reconciled::Ignored(IgnoreReason::Stale));
        assert_eq!(deliver(&second), Reconciled::Ignored(IgnoreReason::Stale));

        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(channel.nonce, 2);
        assert_eq!((channel.balance_a, channel.balance_b), (amount(2), amount(8)));
        assert_eq!(channel.payments.len(), 1);
        assert_eq!(channel.payments[0].origin, PaymentOrigin::Remote);
    }

    #[tokio::test]
    async fn test_payment_with_forged_signature_is_rejected() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;
        let mut record = pair.alice.pay(&channel_id, amount(2)).unwrap();
        record.balance_a = amount(1);
        record.balance_b = amount(9);

        let outcome = pair.bob.reconcile_payment(&PaymentPayload {
            channel_id,
            payment: record,
        });
        assert!(matches!(outcome, Reconciled::Ignored(IgnoreReason::Invalid(_))));
        assert_eq!(pair.bob.get_channel(&channel_id).unwrap().nonce, 0);
    }

    #[tokio::test]
    async fn test_closing_adopts_newer_state_once() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;
        let payload = ChannelClosingPayload {
            channel_id,
            nonce: 3,
            balance_a: amount(1),
            balance_b: amount(9),
            closing_block: 77,
        };
        assert!(pair.bob.reconcile_closing(&payload).is_applied());
        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(channel.state, ChannelState::Closing);
        assert_eq!(channel.closing_block, Some(77));
        assert_eq!((channel.nonce, channel.balance_b), (3, amount(9)));

        assert_eq!(
            pair.bob.reconcile_closing(&payload),
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_closing_on_empty_channel_is_refused() {
        let pair = Pair::new();
        let channel_id = pair.created_channel(10).await;
        let closing = ChannelClosingPayload {
            channel_id,
            nonce: 0,
            balance_a: amount(5),
            balance_b: amount(5),
            closing_block: 7,
        };
        assert!(matches!(
            pair.bob.reconcile_closing(&closing),
            Reconciled::Ignored(IgnoreReason::Invalid(_))
        ));
        let withdrawn = ChannelWithdrawnPayload {
            channel_id,
            withdrawer: pair.alice_address(),
            transaction_hash: "0xabc".into(),
        };
        assert!(matches!(
            pair.bob.reconcile_withdrawn(&withdrawn),
            Reconciled::Ignored(IgnoreReason::Invalid(_))
        ));

        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(channel.state, ChannelState::Empty);
        assert_eq!(channel.closing_block, None);
    }

    #[tokio::test]
    async fn test_closed_notice_cannot_skip_closing() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;
        let closed = ChannelClosedPayload {
            channel_id,
            balance_a: amount(1),
            balance_b: amount(9),
        };
        assert!(matches!(
            pair.bob.reconcile_closed(&closed),
            Reconciled::Ignored(IgnoreReason::Invalid(_))
        ));
        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(channel.state, ChannelState::Active);
        assert_eq!((channel.balance_a, channel.balance_b), (amount(5), amount(5)));
    }

    #[tokio::test]
    async fn test_closed_after_closing_adopts_final_balances() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;
        let closing = ChannelClosingPayload {
            channel_id,
            nonce: 0,
            balance_a: amount(5),
            balance_b: amount(5),
            closing_block: 3,
        };
        assert!(pair.bob.reconcile_closing(&closing).is_applied());

        let closed = ChannelClosedPayload {
            channel_id,
            balance_a: amount(2),
            balance_b: amount(8),
        };
        assert!(pair.bob.reconcile_closed(&closed).is_applied());
        let channel = pair.bob.get_channel(&channel_id).unwrap();
        assert_eq!(channel.state, ChannelState::Closed);
        assert_eq!((channel.balance_a, channel.balance_b), (amount(2), amount(8)));
        assert_eq!(
            pair.bob.reconcile_closed(&closed),
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_withdrawn_closes_channel() {
        let pair = Pair::new();
        let channel_id = pair.active_channel(10).await;
        let closing = ChannelClosingPayload {
            channel_id,
            nonce: 0,
            balance_a: amount(5),
            balance_b: amount(5),
            closing_block: 3,
        };
        assert!(pair.bob.reconcile_closing(&closing).is_applied());

        let payload = ChannelWithdrawnPayload {
            channel_id,
            withdrawer: pair.alice_address(),
            transaction_hash: "0xabc".into(),
        };
        assert!(pair.bob.reconcile_withdrawn(&payload).is_applied());
        assert_eq!(
            pair.bob.get_channel(&channel_id).unwrap().state,
            ChannelState::Closed
        );
        assert_eq!(
            pair.bob.reconcile_withdrawn(&payload),
            Reconciled::Ignored(IgnoreReason::Duplicate)
        );
    }

    #[test]
    fn test_unknown_channel_is_ignored() {
        let pair = Pair::new();
        let payload = ChannelWithdrawnPayload {
            channel_id: shared_types::ChannelId::generate(),
            withdrawer: pair.alice_address(),
            transaction_hash: "0xabc".into(),
        };
        assert_eq!(
            pair.bob.reconcile_withdrawn(&payload),
            Reconciled::Ignored(IgnoreReason::UnknownEntity)
        );
    }
}
