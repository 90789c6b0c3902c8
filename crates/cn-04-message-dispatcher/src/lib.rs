//! # Message Dispatcher
//!
//! **Subsystem ID:** 4
//!
//! Entry point for every envelope a peer sends this node. A message is
//! checked against the deduplication window, recorded, decoded by type and
//! handed to the lifecycle reconciler.
//!
//! ## Architecture
//!
//! - **Domain Layer:** `SeenMessageWindow`, dispatch outcomes, errors, config
//! - **Handlers:** one routing table over the closed set of message types
//! - **Service Layer:** `MessageDispatcher`, which is also the transport's
//!   `InboundHandler`
//!
//! ## Guarantees
//!
//! - A message id is processed at most once while it is in the window.
//! - Handlers are total. "Not my channel" and "not seen yet" come back as
//!   [`Reconciled::Ignored`](cn_03_channel_lifecycle::Reconciled), not as
//!   errors; only an undecodable payload is a [`DispatchError`].

pub mod domain;
mod handlers;
pub mod service;

pub use domain::{
    DispatchConfig, DispatchError, DispatchOutcome, DispatchStats, InboundMessageRecord, PeerEvent,
    SeenMessageWindow,
};
pub use service::MessageDispatcher;
