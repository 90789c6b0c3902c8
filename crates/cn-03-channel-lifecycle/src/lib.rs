//! # Channel Lifecycle Engine
//!
//! **Subsystem ID:** 3
//!
//! Owns the proposal and channel state machines and the balance ledger of
//! every channel this node participates in.
//!
//! ## State Machines
//!
//! ```text
//! Proposal: PROPOSED -> ACCEPTED -> CREATED
//! Channel:  EMPTY -> ACTIVE -> CLOSING -> CLOSED
//! ```
//!
//! Both only move forward. Driver operations take exactly one step;
//! reconciliation from peer notifications or ledger reads may catch up
//! several steps at once but never moves backward.
//!
//! ## Invariants
//!
//! - `balance_a + balance_b == amount` for every channel at every instant
//! - a payment record is applied only if its nonce is greater than the
//!   channel nonce
//! - the settlement contract is the only authority for the ACTIVE
//!   transition and for the challenge window
//!
//! ## Concurrency
//!
//! One mutex per proposal and per channel. No entity lock is held across a
//! settlement call: validate and snapshot under the lock, call the ledger,
//! then re-lock and commit forward-only.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemorySettlement, LocalKeySigner, SimulatedLedger};
pub use domain::{
    Channel, ChannelConfig, ChannelError, ErrorKind, IgnoreReason, Participant, Proposal,
    ProposalStatus, Reconciled,
};
pub use ports::{
    ChannelReconciler, CloseReceipt, Deployment, FundReceipt, LedgerChannelState,
    SettlementContract, SignedState, StateSigner, WithdrawReceipt,
};
pub use service::{ChannelLifecycleService, CloseOutcome, FundOutcome, LifecycleStats, SyncOutcome};
