//! # Proposal-Peer Resolver
//!
//! **Subsystem ID:** 2
//!
//! Answers "who do I notify about the next step of this proposal?" for both
//! sides of a proposal, without a shared coordinator.
//!
//! ## Routing Priority
//!
//! 1. The proposal's mapping (registered on send, refreshed on receipt)
//! 2. The peer of the most recently received message
//! 3. The first currently-connected peer
//!
//! If none of these yields a peer the notification has no route.

pub mod domain;
pub mod service;

pub use domain::{Direction, ProposalPeerMapping, ResolverIndex};
pub use service::{ProposalResolver, Resolution, RouteSource};
