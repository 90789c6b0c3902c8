//! Domain layer for the channel lifecycle.

pub mod channel;
pub mod config;
pub mod errors;
pub mod invariants;
pub mod proposal;
pub mod reconcile;
pub mod signature;

pub use channel::{Channel, Participant};
pub use config::ChannelConfig;
pub use errors::{ChannelError, ErrorKind};
pub use proposal::{Proposal, ProposalStatus};
pub use reconcile::{IgnoreReason, Reconciled};
