//! # Simulated Settlement Ledger
//!
//! [`SimulatedLedger`] is an in-process stand-in for the on-ledger
//! settlement contract, shared by every node in a test. Each node talks to
//! it through an [`InMemorySettlement`] bound to that node's account.
//!
//! The simulator enforces what the real contract enforces:
//! - ACTIVE only once both participants have deposited the full amount
//! - close needs a conserving state signed by a participant
//! - a higher-nonce close during the challenge window replaces the state
//! - withdraw only after `closing_block + challenge_period`
//!
//! Block height only moves when a test calls [`SimulatedLedger::advance_blocks`].

use crate::domain::invariants::{invariant_challenge_elapsed, invariant_conservation};
use crate::domain::signature::{keccak256, recover_state_signer};
use crate::domain::ChannelError;
use crate::ports::{
    CloseReceipt, Deployment, FundReceipt, LedgerChannelState, SettlementContract, SignedState,
    WithdrawReceipt,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Address, Amount, ChannelState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug)]
struct ContractData {
    part_a: Address,
    part_b: Address,
    amount: Amount,
    deposit_a: Option<Amount>,
    deposit_b: Option<Amount>,
    state: ChannelState,
    nonce: u64,
    balance_a: Amount,
    balance_b: Amount,
    closing_block: u64,
}

impl ContractData {
    fn is_participant(&self, account: &Address) -> bool {
        self.part_a == *account || self.part_b == *account
    }

    fn deposited(&self) -> Amount {
        self.deposit_a.unwrap_or_default() + self.deposit_b.unwrap_or_default()
    }
}

/// Shared simulated ledger.
pub struct SimulatedLedger {
    contracts: RwLock<HashMap<Address, ContractData>>,
    height: AtomicU64,
    challenge_period: u64,
    tx_counter: AtomicU64,
    fail_next: RwLock<Option<String>>,
}

impl SimulatedLedger {
    pub fn new(challenge_period: u64) -> Self {
        Self {
            contracts: RwLock::new(HashMap::new()),
            height: AtomicU64::new(1),
            challenge_period,
            tx_counter: AtomicU64::new(0),
            fail_next: RwLock::new(None),
        }
    }

    /// A client of this ledger acting as `account`.
    pub fn account(self: &Arc<Self>, account: Address) -> InMemorySettlement {
        InMemorySettlement {
            ledger: Arc::clone(self),
            account,
        }
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.height.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn challenge_period(&self) -> u64 {
        self.challenge_period
    }

    /// Make the next ledger call fail with `reason` (reverted transaction,
    /// out of gas, RPC down...).
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.write() = Some(reason.into());
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.read().len()
    }

    fn check_fault(&self) -> Result<(), ChannelError> {
        match self.fail_next.write().take() {
            Some(reason) => Err(ChannelError::Ledger(reason)),
            None => Ok(()),
        }
    }

    fn tx_hash(&self, contract: &Address) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let mut input = contract.as_bytes().to_vec();
        input.extend_from_slice(&n.to_be_bytes());
        format!("0x{}", hex::encode(keccak256(&input)))
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(crate::domain::config::DEFAULT_CHALLENGE_PERIOD)
    }
}

/// [`SettlementContract`] client of a [`SimulatedLedger`] for one account.
#[derive(Clone)]
pub struct InMemorySettlement {
    ledger: Arc<SimulatedLedger>,
    account: Address,
}

impl InMemorySettlement {
    pub fn ledger(&self) -> &Arc<SimulatedLedger> {
        &self.ledger
    }

    pub fn account_address(&self) -> Address {
        self.account
    }

    fn with_contract<T>(
        &self,
        contract: &Address,
        f: impl FnOnce(&mut ContractData) -> Result<T, ChannelError>,
    ) -> Result<T, ChannelError> {
        let mut contracts = self.ledger.contracts.write();
        let data = contracts
            .get_mut(contract)
            .ok_or_else(|| ChannelError::Ledger(format!("no contract at {contract}")))?;
        if !data.is_participant(&self.account) {
            return Err(ChannelError::Ledger(format!(
                "{} is not a party to {contract}",
                self.account
            )));
        }
        f(data)
    }
}

fn revert(reason: impl Into<String>) -> ChannelError {
    ChannelError::Ledger(format!("execution reverted: {}", reason.into()))
}

#[async_trait]
impl SettlementContract for InMemorySettlement {
    async fn deploy(
        &self,
        part_a: Address,
        part_b: Address,
        amount: Amount,
    ) -> Result<Deployment, ChannelError> {
        self.ledger.check_fault()?;
        if part_a == part_b {
            return Err(revert("participants must differ"));
        }
        if amount.is_zero() {
            return Err(revert("amount must be positive"));
        }
        if self.account != part_a && self.account != part_b {
            return Err(revert("deployer must be a participant"));
        }

        let n = self.ledger.tx_counter.fetch_add(1, Ordering::SeqCst);
        let mut seed = part_a.as_bytes().to_vec();
        seed.extend_from_slice(part_b.as_bytes());
        seed.extend_from_slice(&n.to_be_bytes());
        let hash = keccak256(&seed);
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&hash[12..]);
        let contract_address = Address::new(raw);

        self.ledger.contracts.write().insert(
            contract_address,
            ContractData {
                part_a,
                part_b,
                amount,
                deposit_a: None,
                deposit_b: None,
                state: ChannelState::Empty,
                nonce: 0,
                balance_a: Amount::zero(),
                balance_b: Amount::zero(),
                closing_block: 0,
            },
        );
        info!(contract = %contract_address, amount = %amount, "[cn-03] ledger contract deployed");
        Ok(Deployment { contract_address })
    }

    async fn approve_and_fund(
        &self,
        contract: Address,
        participant: Address,
        amount: Amount,
    ) -> Result<FundReceipt, ChannelError> {
        self.ledger.check_fault()?;
        if participant != self.account {
            return Err(revert("can only fund from the sending account"));
        }
        self.with_contract(&contract, |data| {
            if data.state != ChannelState::Empty {
                return Err(revert("channel not accepting deposits"));
            }
            let slot = if participant == data.part_a {
                &mut data.deposit_a
            } else {
                &mut data.deposit_b
            };
            if slot.is_some() {
                return Err(revert("already deposited"));
            }
            *slot = Some(amount);
            if data.deposited() > data.amount {
                if participant == data.part_a {
                    data.deposit_a = None;
                } else {
                    data.deposit_b = None;
                }
                return Err(revert("deposit exceeds channel amount"));
            }

            data.balance_a = data.deposit_a.unwrap_or_default();
            data.balance_b = data.deposit_b.unwrap_or_default();
            if data.deposit_a.is_some() && data.deposit_b.is_some() && data.deposited() == data.amount
            {
                data.state = ChannelState::Active;
                info!(contract = %contract, "[cn-03] ledger channel active");
            }
            Ok(())
        })?;
        debug!(contract = %contract, participant = %participant, "[cn-03] ledger deposit");
        Ok(FundReceipt {
            transaction_hash: self.ledger.tx_hash(&contract),
        })
    }

    async fn read_state(&self, contract: Address) -> Result<LedgerChannelState, ChannelError> {
        self.ledger.check_fault()?;
        let contracts = self.ledger.contracts.read();
        let data = contracts
            .get(&contract)
            .ok_or_else(|| ChannelError::Ledger(format!("no contract at {contract}")))?;
        Ok(LedgerChannelState {
            state: data.state,
            balance_a: data.balance_a,
            balance_b: data.balance_b,
            amount: data.amount,
        })
    }

    async fn close(
        &self,
        contract: Address,
        state: &SignedState,
    ) -> Result<CloseReceipt, ChannelError> {
        self.ledger.check_fault()?;
        let height = self.ledger.height();
        let period = self.ledger.challenge_period;
        let signer =
            recover_state_signer(state.nonce, state.balance_a, state.balance_b, &state.signature)
                .map_err(|_| revert("bad signature"))?;

        let block_number = self.with_contract(&contract, |data| {
            if !data.is_participant(&signer) {
                return Err(revert("state not signed by a participant"));
            }
            invariant_conservation(state.balance_a, state.balance_b, data.amount)
                .map_err(|_| revert("balances do not conserve amount"))?;

            match data.state {
                ChannelState::Active => {
                    data.closing_block = height;
                    data.state = ChannelState::Closing;
                }
                ChannelState::Closing => {
                    if invariant_challenge_elapsed(height, data.closing_block, period).is_ok() {
                        return Err(revert("challenge period over"));
                    }
                    if state.nonce <= data.nonce {
                        return Err(revert("challenge needs a newer state"));
                    }
                }
                _ => return Err(revert("channel not closable")),
            }
            data.nonce = state.nonce;
            data.balance_a = state.balance_a;
            data.balance_b = state.balance_b;
            Ok(data.closing_block)
        })?;

        info!(contract = %contract, nonce = state.nonce, block = block_number, "[cn-03] ledger close submitted");
        Ok(CloseReceipt { block_number })
    }

    async fn withdraw(&self, contract: Address) -> Result<WithdrawReceipt, ChannelError> {
        self.ledger.check_fault()?;
        let height = self.ledger.height();
        let period = self.ledger.challenge_period;
        self.with_contract(&contract, |data| {
            if data.state != ChannelState::Closing {
                return Err(revert("channel not closing"));
            }
            invariant_challenge_elapsed(height, data.closing_block, period)
                .map_err(|_| revert("challenge period active"))?;
            data.state = ChannelState::Closed;
            Ok(())
        })?;
        info!(contract = %contract, "[cn-03] ledger withdrawn");
        Ok(WithdrawReceipt {
            transaction_hash: self.ledger.tx_hash(&contract),
        })
    }

    async fn current_block_height(&self) -> Result<u64, ChannelError> {
        Ok(self.ledger.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalKeySigner;
    use crate::ports::StateSigner;

    struct Fixture {
        ledger: Arc<SimulatedLedger>,
        alice: LocalKeySigner,
        bob: LocalKeySigner,
    }

    fn fixture() -> Fixture {
        Fixture {
            ledger: Arc::new(SimulatedLedger::new(24)),
            alice: LocalKeySigner::random(),
            bob: LocalKeySigner::random(),
        }
    }

    fn amount(n: u64) -> Amount {
        Amount::from(n)
    }

    async fn funded(f: &Fixture) -> Address {
        let a = f.ledger.account(f.alice.address());
        let b = f.ledger.account(f.bob.address());
        let contract = a
            .deploy(f.alice.address(), f.bob.address(), amount(10))
            .await
            .unwrap()
            .contract_address;
        a.approve_and_fund(contract, f.alice.address(), amount(5))
            .await
            .unwrap();
        b.approve_and_fund(contract, f.bob.address(), amount(5))
            .await
            .unwrap();
        contract
    }

    fn signed(signer: &LocalKeySigner, nonce: u64, a: u64, b: u64) -> SignedState {
        SignedState {
            nonce,
            balance_a: amount(a),
            balance_b: amount(b),
            signature: signer.sign_state(nonce, amount(a), amount(b)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_active_only_after_both_deposits() {
        let f = fixture();
        let a = f.ledger.account(f.alice.address());
        let contract = a
            .deploy(f.alice.address(), f.bob.address(), amount(10))
            .await
            .unwrap()
            .contract_address;

        a.approve_and_fund(contract, f.alice.address(), amount(5))
            .await
            .unwrap();
        assert_eq!(
            a.read_state(contract).await.unwrap().state,
            ChannelState::Empty
        );
        assert!(a
            .approve_and_fund(contract, f.alice.address(), amount(5))
            .await
            .is_err());
        // Alice cannot deposit on Bob's behalf.
        assert!(a
            .approve_and_fund(contract, f.bob.address(), amount(5))
            .await
            .is_err());

        let b = f.ledger.account(f.bob.address());
        b.approve_and_fund(contract, f.bob.address(), amount(5))
            .await
            .unwrap();
        let state = b.read_state(contract).await.unwrap();
        assert_eq!(state.state, ChannelState::Active);
        assert_eq!(state.balance_a + state.balance_b, amount(10));
    }

    #[tokio::test]
    async fn test_close_challenge_and_withdraw_window() {
        let f = fixture();
        let contract = funded(&f).await;
        let a = f.ledger.account(f.alice.address());
        let b = f.ledger.account(f.bob.address());
        f.ledger.set_height(100);

        let receipt = a.close(contract, &signed(&f.bob, 1, 4, 6)).await.unwrap();
        assert_eq!(receipt.block_number, 100);

        // Stale challenge refused, newer one accepted.
        assert!(b.close(contract, &signed(&f.alice, 1, 5, 5)).await.is_err());
        b.close(contract, &signed(&f.alice, 2, 3, 7)).await.unwrap();
        assert_eq!(a.read_state(contract).await.unwrap().balance_b, amount(7));

        f.ledger.set_height(124);
        assert!(a.withdraw(contract).await.is_err());
        f.ledger.set_height(125);
        assert!(a.withdraw(contract).await.unwrap().transaction_hash.starts_with("0x"));
        assert_eq!(
            a.read_state(contract).await.unwrap().state,
            ChannelState::Closed
        );
    }

    #[tokio::test]
    async fn test_close_rejects_foreign_or_broken_state() {
        let f = fixture();
        let contract = funded(&f).await;
        let a = f.ledger.account(f.alice.address());
        let stranger = LocalKeySigner::random();

        assert!(a.close(contract, &signed(&stranger, 1, 5, 5)).await.is_err());
        assert!(a.close(contract, &signed(&f.bob, 1, 5, 6)).await.is_err());
        assert!(f
            .ledger
            .account(stranger.address())
            .close(contract, &signed(&f.bob, 1, 5, 5))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_injected_fault_fails_one_call() {
        let f = fixture();
        let a = f.ledger.account(f.alice.address());
        f.ledger.fail_next("out of gas");
        let err = a
            .deploy(f.alice.address(), f.bob.address(), amount(10))
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::Ledger("out of gas".into()));
        assert!(a
            .deploy(f.alice.address(), f.bob.address(), amount(10))
            .await
            .is_ok());
        assert_eq!(f.ledger.contract_count(), 1);
    }
}
