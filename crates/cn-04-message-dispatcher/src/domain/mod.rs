//! Dispatcher domain: the deduplication window and dispatch results.

pub mod config;
pub mod errors;
pub mod outcome;
pub mod window;

pub use config::DispatchConfig;
pub use errors::DispatchError;
pub use outcome::{DispatchOutcome, DispatchStats, PeerEvent};
pub use window::{InboundMessageRecord, SeenMessageWindow};
