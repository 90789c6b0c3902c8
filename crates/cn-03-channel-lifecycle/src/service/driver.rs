//! Driver operations: each validates under the entity lock, releases it for
//! the ledger call, then re-locks and commits forward-only. A ledger error
//! leaves the entity as it was.

use super::{ChannelLifecycleService, CloseOutcome, EntityKey, FundOutcome, SyncOutcome};
use crate::domain::invariants::{invariant_challenge_elapsed, invariant_conservation};
use crate::domain::{Channel, ChannelError, Proposal, ProposalStatus};
use crate::ports::{SignedState, WithdrawReceipt};
use parking_lot::Mutex;
use shared_types::{
    Address, Amount, ChannelId, ChannelState, PaymentId, PaymentOrigin, PaymentRecord, ProposalId,
};
use std::sync::Arc;
use tracing::{info, warn};

impl ChannelLifecycleService {
    /// Propose a channel of `amount` from this node to `acceptor`.
    pub fn create_proposal(
        &self,
        acceptor: Address,
        amount: Amount,
    ) -> Result<Proposal, ChannelError> {
        if amount.is_zero() {
            return Err(ChannelError::Validation("amount must be positive".into()));
        }
        let proposer = self.signer.address();
        if acceptor == proposer {
            return Err(ChannelError::Validation(
                "cannot open a channel with yourself".into(),
            ));
        }

        let proposal = Proposal::new(
            ProposalId::generate(),
            proposer,
            acceptor,
            amount,
            self.time_source.now(),
        );
        self.proposals
            .write()
            .insert(proposal.id, Arc::new(Mutex::new(proposal.clone())));

        info!(proposal_id = %proposal.id, acceptor = %acceptor, amount = %amount, "[cn-03] proposal created");
        Ok(proposal)
    }

    /// Accept a PROPOSED proposal as its designated acceptor.
    pub fn accept_proposal(
        &self,
        id: &ProposalId,
        acceptor: Address,
    ) -> Result<Proposal, ChannelError> {
        let entry = self.proposal_entry(id)?;
        let mut proposal = entry.lock();
        if proposal.status != ProposalStatus::Proposed {
            return Err(ChannelError::InvalidState {
                operation: "accept",
                expected: ProposalStatus::Proposed.to_string(),
                actual: proposal.status.to_string(),
            });
        }
        if proposal.acceptor != acceptor {
            return Err(ChannelError::Unauthorized(acceptor));
        }
        proposal.accept(self.time_source.now())?;

        info!(proposal_id = %id, "[cn-03] proposal accepted");
        Ok(proposal.clone())
    }

    /// Deploy the settlement contract for an ACCEPTED proposal and create
    /// the channel in EMPTY.
    pub async fn materialize_channel(&self, id: &ProposalId) -> Result<Channel, ChannelError> {
        let _busy = self.begin(EntityKey::Proposal(*id))?;
        let entry = self.proposal_entry(id)?;

        let (proposer, acceptor, amount) = {
            let proposal = entry.lock();
            if proposal.status != ProposalStatus::Accepted {
                return Err(ChannelError::InvalidState {
                    operation: "materialize",
                    expected: ProposalStatus::Accepted.to_string(),
                    actual: proposal.status.to_string(),
                });
            }
            let local = self.signer.address();
            if !proposal.is_participant(&local) {
                return Err(ChannelError::NotParticipant(local));
            }
            (proposal.proposer, proposal.acceptor, proposal.amount)
        };

        let deployment = self.settlement.deploy(proposer, acceptor, amount).await?;

        let channel = Channel::new(
            ChannelId::generate(),
            *id,
            deployment.contract_address,
            proposer,
            acceptor,
            amount,
            self.time_source.now(),
        );
        {
            let mut proposal = entry.lock();
            if proposal.status != ProposalStatus::Accepted {
                warn!(proposal_id = %id, contract = %deployment.contract_address, "[cn-03] proposal moved during deploy, contract orphaned");
                return Err(ChannelError::InvalidState {
                    operation: "materialize",
                    expected: ProposalStatus::Accepted.to_string(),
                    actual: proposal.status.to_string(),
                });
            }
            proposal.mark_created(channel.id);
        }
        self.channels
            .write()
            .insert(channel.id, Arc::new(Mutex::new(channel.clone())));

        info!(
            proposal_id = %id,
            channel_id = %channel.id,
            contract = %channel.contract_address,
            "[cn-03] channel created"
        );
        Ok(channel)
    }

    /// Deposit `participant`'s share, then adopt the ledger's view of the
    /// channel state.
    ///
    /// The funding flag is committed as soon as the deposit succeeds; if the
    /// follow-up ledger read fails the flag stays set and the error is
    /// returned.
    pub async fn fund(
        &self,
        id: &ChannelId,
        participant: Address,
    ) -> Result<FundOutcome, ChannelError> {
        let _busy = self.begin(EntityKey::Channel(*id))?;
        let entry = self.channel_entry(id)?;

        let (contract, share, role) = {
            let channel = entry.lock();
            let role = channel
                .participant(&participant)
                .ok_or(ChannelError::NotParticipant(participant))?;
            if channel.is_funded_by(role) {
                return Err(ChannelError::AlreadyFunded(participant));
            }
            if channel.state != ChannelState::Empty {
                return Err(ChannelError::wrong_channel_state(
                    "fund",
                    ChannelState::Empty,
                    channel.state,
                ));
            }
            (channel.contract_address, channel.funding_share(role), role)
        };

        let receipt = self
            .settlement
            .approve_and_fund(contract, participant, share)
            .await?;
        entry.lock().set_funded(role, self.time_source.now());

        let ledger = self.settlement.read_state(contract).await?;
        let (state, both_funded) = {
            let mut channel = entry.lock();
            if channel.adopt_state(ledger.state, self.time_source.now()) {
                info!(channel_id = %id, state = %channel.state, "[cn-03] ledger state adopted");
            }
            (channel.state, channel.both_funded())
        };

        info!(channel_id = %id, participant = %participant, %state, both_funded, "[cn-03] channel funded");
        Ok(FundOutcome {
            state,
            both_funded,
            transaction_hash: receipt.transaction_hash,
        })
    }

    /// Pay `amount` to the counterparty: sign the next state and apply it.
    pub fn pay(&self, id: &ChannelId, amount: Amount) -> Result<PaymentRecord, ChannelError> {
        if amount.is_zero() {
            return Err(ChannelError::Validation("amount must be positive".into()));
        }
        let entry = self.channel_entry(id)?;
        let mut channel = entry.lock();
        if channel.state != ChannelState::Active {
            return Err(ChannelError::wrong_channel_state(
                "pay",
                ChannelState::Active,
                channel.state,
            ));
        }
        // Checked under the channel lock, so `close` reads either the state
        // before this payment or none after it.
        if self.is_busy(&EntityKey::Channel(*id)) {
            return Err(ChannelError::InvalidState {
                operation: "pay",
                expected: "no close in progress".into(),
                actual: "close in progress".into(),
            });
        }

        let payer = self.signer.address();
        let role = channel
            .participant(&payer)
            .ok_or(ChannelError::NotParticipant(payer))?;
        let (balance_a, balance_b) = channel.balances_after_transfer(role, amount)?;
        let nonce = channel.nonce + 1;
        let signature = self.signer.sign_state(nonce, balance_a, balance_b)?;

        let now = self.time_source.now();
        let record = PaymentRecord {
            id: PaymentId::generate(),
            nonce,
            balance_a,
            balance_b,
            amount,
            sender: payer,
            recipient: channel.address_of(role.other()),
            signature,
            timestamp: now,
            origin: PaymentOrigin::Local,
        };
        channel.apply_payment(record.clone(), now)?;

        info!(channel_id = %id, nonce, amount = %amount, "[cn-03] payment sent");
        Ok(record)
    }

    /// Submit the highest known state to the ledger and enter CLOSING.
    pub async fn close(&self, id: &ChannelId) -> Result<CloseOutcome, ChannelError> {
        let _busy = self.begin(EntityKey::Channel(*id))?;
        let entry = self.channel_entry(id)?;

        let (contract, signed) = {
            let channel = entry.lock();
            if channel.state != ChannelState::Active {
                return Err(ChannelError::wrong_channel_state(
                    "close",
                    ChannelState::Active,
                    channel.state,
                ));
            }
            let signed = match channel.latest_payment() {
                Some(record) if record.origin == PaymentOrigin::Remote => SignedState {
                    nonce: record.nonce,
                    balance_a: record.balance_a,
                    balance_b: record.balance_b,
                    signature: record.signature,
                },
                Some(record) => self.sign_state(record.nonce, record.balance_a, record.balance_b)?,
                None => self.sign_state(0, channel.balance_a, channel.balance_b)?,
            };
            (channel.contract_address, signed)
        };

        let receipt = self.settlement.close(contract, &signed).await?;

        {
            let mut channel = entry.lock();
            channel.adopt_state(ChannelState::Closing, self.time_source.now());
            channel.closing_block.get_or_insert(receipt.block_number);
        }

        info!(channel_id = %id, nonce = signed.nonce, block = receipt.block_number, "[cn-03] channel closing");
        Ok(CloseOutcome {
            closing_block: receipt.block_number,
            nonce: signed.nonce,
            balance_a: signed.balance_a,
            balance_b: signed.balance_b,
        })
    }

    /// Release funds once the challenge window has passed.
    pub async fn withdraw(&self, id: &ChannelId) -> Result<WithdrawReceipt, ChannelError> {
        let _busy = self.begin(EntityKey::Channel(*id))?;
        let entry = self.channel_entry(id)?;

        let (contract, closing_block) = {
            let channel = entry.lock();
            match (channel.state, channel.closing_block) {
                (ChannelState::Closing, Some(block)) => (channel.contract_address, block),
                (state, _) => {
                    return Err(ChannelError::wrong_channel_state(
                        "withdraw",
                        ChannelState::Closing,
                        state,
                    ))
                }
            }
        };

        let height = self.settlement.current_block_height().await?;
        invariant_challenge_elapsed(height, closing_block, self.config.challenge_period)?;

        let receipt = self.settlement.withdraw(contract).await?;
        entry
            .lock()
            .adopt_state(ChannelState::Closed, self.time_source.now());

        info!(channel_id = %id, tx = %receipt.transaction_hash, "[cn-03] channel withdrawn");
        Ok(receipt)
    }

    /// Re-read the channel from the ledger and adopt anything newer.
    ///
    /// Once the channel is CLOSING or later the ledger's balances win, since
    /// a challenge may have replaced the submitted state.
    pub async fn sync_channel(&self, id: &ChannelId) -> Result<SyncOutcome, ChannelError> {
        let entry = self.channel_entry(id)?;
        let contract = entry.lock().contract_address;

        let ledger = self.settlement.read_state(contract).await?;

        let mut channel = entry.lock();
        let previous = channel.state;
        let now = self.time_source.now();
        channel.adopt_state(ledger.state, now);
        if ledger.state >= ChannelState::Closing
            && channel.state >= ChannelState::Closing
            && invariant_conservation(ledger.balance_a, ledger.balance_b, channel.amount).is_ok()
            && (ledger.balance_a, ledger.balance_b) != (channel.balance_a, channel.balance_b)
        {
            channel.adopt_balances(ledger.balance_a, ledger.balance_b, now)?;
            info!(channel_id = %id, "[cn-03] ledger balances adopted");
        }
        if previous != channel.state {
            info!(channel_id = %id, from = %previous, to = %channel.state, "[cn-03] channel synced");
        }

        Ok(SyncOutcome {
            previous,
            current: channel.state,
            ledger,
        })
    }

    /// Drop PROPOSED/ACCEPTED proposals older than `max_age_ms`.
    pub fn purge_stale_proposals(&self, max_age_ms: u64) -> Vec<ProposalId> {
        let now = self.time_source.now();
        let mut proposals = self.proposals.write();
        let stale: Vec<ProposalId> = proposals
            .iter()
            .filter(|(_, entry)| {
                let p = entry.lock();
                p.status.is_pending() && now.saturating_since(p.created_at) > max_age_ms
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            proposals.remove(id);
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "[cn-03] stale proposals purged");
        }
        stale
    }

    /// Drop the given proposals unless they already have a channel.
    pub fn purge_proposals(&self, ids: &[ProposalId]) -> Vec<ProposalId> {
        let mut proposals = self.proposals.write();
        let mut purged = Vec::new();
        for id in ids {
            let pending = proposals
                .get(id)
                .is_some_and(|entry| entry.lock().status.is_pending());
            if pending {
                proposals.remove(id);
                purged.push(*id);
            }
        }
        if !purged.is_empty() {
            info!(count = purged.len(), "[cn-03] proposals purged");
        }
        purged
    }

    fn sign_state(
        &self,
        nonce: u64,
        balance_a: Amount,
        balance_b: Amount,
    ) -> Result<SignedState, ChannelError> {
        Ok(SignedState {
            nonce,
            balance_a,
            balance_b,
            signature: self.signer.sign_state(nonce, balance_a, balance_b)?,
        })
    }
}
