//! Ports for the channel lifecycle.

pub mod inbound;
pub mod outbound;

pub use inbound::ChannelReconciler;
pub use outbound::{
    CloseReceipt, Deployment, FundReceipt, LedgerChannelState, SettlementContract, SignedState,
    StateSigner, WithdrawReceipt,
};
