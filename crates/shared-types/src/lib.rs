//! # Shared Types Crate
//!
//! This crate contains every type that crosses a crate boundary or the wire
//! between two channel nodes.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers, addresses and the wire envelope
//!   are defined once, here.
//! - **No floating point money**: amounts are `U256` in the ledger's smallest
//!   unit and travel as decimal strings.
//! - **Envelope Authority**: `WireMessage::from` is the sender's network
//!   address; payloads never repeat it.

pub mod amount;
pub mod delivery;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod messages;

pub use amount::{parse_amount, Amount};
pub use delivery::{DeliveryOutcome, DeliveryReport, DeliveryResult};
pub use entities::*;
pub use envelope::{MessageType, WireMessage};
pub use errors::TypesError;
pub use messages::*;
