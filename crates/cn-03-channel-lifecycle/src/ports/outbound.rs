//! # Driven Ports (Outbound SPI)
//!
//! The settlement contract and the state signer. Both are trusted: the
//! contract's reported state is ground truth, and the signer holds this
//! node's ledger key.

use crate::domain::ChannelError;
use async_trait::async_trait;
use shared_types::{Address, Amount, ChannelState, StateSignature};

/// Result of deploying a settlement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundReceipt {
    pub transaction_hash: String,
}

/// On-ledger view of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerChannelState {
    pub state: ChannelState,
    pub balance_a: Amount,
    pub balance_b: Amount,
    pub amount: Amount,
}

/// A channel state together with the signature submitted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedState {
    pub nonce: u64,
    pub balance_a: Amount,
    pub balance_b: Amount,
    pub signature: StateSignature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReceipt {
    /// Block at which the challenge window starts.
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub transaction_hash: String,
}

/// The on-ledger settlement contract, as seen by one account.
///
/// Failures are reported as [`ChannelError::Ledger`].
#[async_trait]
pub trait SettlementContract: Send + Sync {
    /// Deploy a contract locking `amount` between `part_a` and `part_b`.
    async fn deploy(
        &self,
        part_a: Address,
        part_b: Address,
        amount: Amount,
    ) -> Result<Deployment, ChannelError>;

    /// Approve and deposit `amount` on behalf of `participant`.
    async fn approve_and_fund(
        &self,
        contract: Address,
        participant: Address,
        amount: Amount,
    ) -> Result<FundReceipt, ChannelError>;

    async fn read_state(&self, contract: Address) -> Result<LedgerChannelState, ChannelError>;

    /// Submit a signed state and start the challenge window.
    async fn close(
        &self,
        contract: Address,
        state: &SignedState,
    ) -> Result<CloseReceipt, ChannelError>;

    /// Release funds once the challenge window has elapsed.
    async fn withdraw(&self, contract: Address) -> Result<WithdrawReceipt, ChannelError>;

    async fn current_block_height(&self) -> Result<u64, ChannelError>;
}

/// Signs canonical channel states with this node's ledger key.
pub trait StateSigner: Send + Sync {
    /// Ledger address of the key.
    fn address(&self) -> Address;

    fn sign_state(
        &self,
        nonce: u64,
        balance_a: Amount,
        balance_b: Amount,
    ) -> Result<StateSignature, ChannelError>;
}
