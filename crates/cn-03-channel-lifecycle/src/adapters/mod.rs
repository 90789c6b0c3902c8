//! Adapters for the channel lifecycle.

pub mod settlement;
pub mod signer;

pub use settlement::{InMemorySettlement, SimulatedLedger};
pub use signer::LocalKeySigner;
