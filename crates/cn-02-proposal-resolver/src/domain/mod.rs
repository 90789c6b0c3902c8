//! Domain layer for the resolver.

pub mod index;
pub mod mapping;

pub use index::ResolverIndex;
pub use mapping::{Direction, ProposalPeerMapping};
