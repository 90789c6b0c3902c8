//! # Channel Entity
//!
//! The locally tracked half of a two-party escrow. Balances change only
//! through [`Channel::apply_payment`] and [`Channel::adopt_balances`], both of
//! which enforce conservation; state changes only forward.

use super::errors::ChannelError;
use super::invariants::{initial_split, invariant_conservation, invariant_nonce_advances};
use serde::Serialize;
use shared_types::amount::decimal;
use shared_types::{
    Address, Amount, ChannelId, ChannelState, PaymentRecord, ProposalId, Timestamp,
};

/// Which side of the channel an address is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    A,
    B,
}

impl Participant {
    pub fn other(&self) -> Participant {
        match self {
            Participant::A => Participant::B,
            Participant::B => Participant::A,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    /// Proposal this channel materialised; used to route notifications.
    pub proposal_id: ProposalId,
    pub contract_address: Address,
    pub part_a: Address,
    pub part_b: Address,
    /// Total locked amount.
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub state: ChannelState,
    pub nonce: u64,
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    #[serde(with = "decimal")]
    pub balance_b: Amount,
    /// Applied payments in nonce order.
    pub payments: Vec<PaymentRecord>,
    pub funded_a: bool,
    pub funded_b: bool,
    pub closing_block: Option<u64>,
    pub updated_at: Timestamp,
}

impl Channel {
    /// A freshly deployed channel: EMPTY, nonce 0, initial split.
    pub fn new(
        id: ChannelId,
        proposal_id: ProposalId,
        contract_address: Address,
        part_a: Address,
        part_b: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Self {
        let (balance_a, balance_b) = initial_split(amount);
        Self {
            id,
            proposal_id,
            contract_address,
            part_a,
            part_b,
            amount,
            state: ChannelState::Empty,
            nonce: 0,
            balance_a,
            balance_b,
            payments: Vec::new(),
            funded_a: false,
            funded_b: false,
            closing_block: None,
            updated_at: now,
        }
    }

    pub fn participant(&self, address: &Address) -> Option<Participant> {
        if self.part_a == *address {
            Some(Participant::A)
        } else if self.part_b == *address {
            Some(Participant::B)
        } else {
            None
        }
    }

    pub fn address_of(&self, participant: Participant) -> Address {
        match participant {
            Participant::A => self.part_a,
            Participant::B => self.part_b,
        }
    }

    pub fn balance_of(&self, participant: Participant) -> Amount {
        match participant {
            Participant::A => self.balance_a,
            Participant::B => self.balance_b,
        }
    }

    /// What `participant` deposits: its initial share.
    pub fn funding_share(&self, participant: Participant) -> Amount {
        let (a, b) = initial_split(self.amount);
        match participant {
            Participant::A => a,
            Participant::B => b,
        }
    }

    pub fn is_funded_by(&self, participant: Participant) -> bool {
        match participant {
            Participant::A => self.funded_a,
            Participant::B => self.funded_b,
        }
    }

    pub fn set_funded(&mut self, participant: Participant, now: Timestamp) {
        match participant {
            Participant::A => self.funded_a = true,
            Participant::B => self.funded_b = true,
        }
        self.updated_at = now;
    }

    pub fn both_funded(&self) -> bool {
        self.funded_a && self.funded_b
    }

    /// Take exactly one lifecycle step.
    pub fn transition_to(&mut self, next: ChannelState, now: Timestamp) -> Result<(), ChannelError> {
        if !self.state.can_transition_to(next) {
            return Err(ChannelError::InvalidState {
                operation: "channel transition",
                expected: format!("a state before {next}"),
                actual: self.state.to_string(),
            });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Adopt a ledger-observed state if it is ahead of ours, possibly by
    /// several steps. Returns whether the state changed.
    pub fn adopt_state(&mut self, observed: ChannelState, now: Timestamp) -> bool {
        if self.state.is_behind(observed) {
            self.state = observed;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// Overwrite balances with an authoritative pair that conserves the
    /// channel amount.
    pub fn adopt_balances(
        &mut self,
        balance_a: Amount,
        balance_b: Amount,
        now: Timestamp,
    ) -> Result<(), ChannelError> {
        invariant_conservation(balance_a, balance_b, self.amount)?;
        self.balance_a = balance_a;
        self.balance_b = balance_b;
        self.updated_at = now;
        Ok(())
    }

    /// Balances for a transfer of `amount` from `payer`, without applying it.
    pub fn balances_after_transfer(
        &self,
        payer: Participant,
        amount: Amount,
    ) -> Result<(Amount, Amount), ChannelError> {
        let available = self.balance_of(payer);
        if available < amount {
            return Err(ChannelError::InsufficientBalance {
                available: available.to_string(),
                requested: amount.to_string(),
            });
        }
        Ok(match payer {
            Participant::A => (self.balance_a - amount, self.balance_b + amount),
            Participant::B => (self.balance_a + amount, self.balance_b - amount),
        })
    }

    /// Append a payment record, advancing nonce and balances.
    ///
    /// Refuses records whose nonce does not advance the channel or whose
    /// balances do not conserve the amount.
    pub fn apply_payment(&mut self, record: PaymentRecord, now: Timestamp) -> Result<(), ChannelError> {
        if !invariant_nonce_advances(self.nonce, record.nonce) {
            return Err(ChannelError::Validation(format!(
                "stale nonce {} (channel at {})",
                record.nonce, self.nonce
            )));
        }
        invariant_conservation(record.balance_a, record.balance_b, self.amount)?;

        self.nonce = record.nonce;
        self.balance_a = record.balance_a;
        self.balance_b = record.balance_b;
        self.payments.push(record);
        self.updated_at = now;
        Ok(())
    }

    /// Highest-nonce payment record, if any.
    pub fn latest_payment(&self) -> Option<&PaymentRecord> {
        self.payments.iter().max_by_key(|p| p.nonce)
    }
}
