//! Two lifecycle services sharing one simulated ledger, with helpers that
//! walk a channel to a given state. Notifications are applied by hand.

use super::ChannelLifecycleService;
use crate::adapters::{InMemorySettlement, LocalKeySigner, SimulatedLedger};
use crate::domain::ChannelConfig;
use crate::ports::{ChannelReconciler, SettlementContract, StateSigner};
use shared_types::{
    Address, Amount, ChannelAcceptedPayload, ChannelCreatedPayload, ChannelId,
    ChannelProposalPayload, ManualTimeSource, ProposalId, Timestamp,
};
use std::sync::Arc;

pub(crate) fn amount(n: u64) -> Amount {
    Amount::from(n)
}

pub(crate) struct Pair {
    pub ledger: Arc<SimulatedLedger>,
    pub clock: Arc<ManualTimeSource>,
    pub alice: ChannelLifecycleService,
    pub bob: ChannelLifecycleService,
}

impl Pair {
    pub fn new() -> Self {
        Self::with_alice_settlement(|account| Arc::new(account) as Arc<dyn SettlementContract>)
    }

    /// Like [`Pair::new`], with Alice's ledger account passed through `wrap`.
    pub fn with_alice_settlement(
        wrap: impl FnOnce(InMemorySettlement) -> Arc<dyn SettlementContract>,
    ) -> Self {
        let config = ChannelConfig::default();
        let ledger = Arc::new(SimulatedLedger::new(config.challenge_period));
        let clock = Arc::new(ManualTimeSource::new(1_000));
        let service = |signer: LocalKeySigner, settlement: Arc<dyn SettlementContract>| {
            ChannelLifecycleService::new(settlement, Arc::new(signer), clock.clone(), config.clone())
        };
        let alice_key = LocalKeySigner::random();
        let alice_account = wrap(ledger.account(alice_key.address()));
        let alice = service(alice_key, alice_account);
        let bob_key = LocalKeySigner::random();
        let bob_account: Arc<dyn SettlementContract> = Arc::new(ledger.account(bob_key.address()));
        let bob = service(bob_key, bob_account);
        Self {
            ledger,
            clock,
            alice,
            bob,
        }
    }

    pub fn alice_address(&self) -> Address {
        self.alice.local_address()
    }

    pub fn bob_address(&self) -> Address {
        self.bob.local_address()
    }

    /// A fresh proposal from Alice to Bob, as Bob would receive it.
    pub fn proposal_payload(&self, value: u64) -> ChannelProposalPayload {
        ChannelProposalPayload {
            proposal_id: ProposalId::generate(),
            proposer: self.alice_address(),
            acceptor: self.bob_address(),
            amount: amount(value),
            created_at: Timestamp(1_000),
        }
    }

    /// Alice's view of a channel as a `CHANNEL_CREATED` notification.
    pub fn created_payload(&self, channel_id: &ChannelId) -> ChannelCreatedPayload {
        let channel = self.alice.get_channel(channel_id).unwrap();
        ChannelCreatedPayload {
            proposal_id: channel.proposal_id,
            channel_id: channel.id,
            contract_address: channel.contract_address,
            part_a: channel.part_a,
            part_b: channel.part_b,
            amount: channel.amount,
            balance_a: channel.balance_a,
            balance_b: channel.balance_b,
        }
    }

    /// Propose, accept and deploy; both sides know the EMPTY channel.
    pub async fn created_channel(&self, value: u64) -> ChannelId {
        let proposal = self
            .alice
            .create_proposal(self.bob_address(), amount(value))
            .unwrap();
        assert!(self
            .bob
            .reconcile_proposal(&ChannelProposalPayload {
                proposal_id: proposal.id,
                proposer: proposal.proposer,
                acceptor: proposal.acceptor,
                amount: proposal.amount,
                created_at: proposal.created_at,
            })
            .is_applied());

        let accepted = self
            .bob
            .accept_proposal(&proposal.id, self.bob_address())
            .unwrap();
        assert!(self
            .alice
            .reconcile_acceptance(&ChannelAcceptedPayload {
                proposal_id: proposal.id,
                acceptor: accepted.acceptor,
                accepted_at: accepted.accepted_at.unwrap(),
            })
            .is_applied());

        let channel = self.alice.materialize_channel(&proposal.id).await.unwrap();
        assert!(self
            .bob
            .reconcile_created(&self.created_payload(&channel.id))
            .is_applied());
        channel.id
    }

    /// A channel both sides see as ACTIVE.
    pub async fn active_channel(&self, value: u64) -> ChannelId {
        let id = self.created_channel(value).await;
        self.alice.fund(&id, self.alice_address()).await.unwrap();
        self.bob.fund(&id, self.bob_address()).await.unwrap();
        self.alice.sync_channel(&id).await.unwrap();
        id
    }
}
