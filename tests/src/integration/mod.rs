//! Multi-node integration tests.

pub mod fixtures;

#[cfg(test)]
mod channel_flow;
#[cfg(test)]
mod delivery;
#[cfg(test)]
mod http_wire;
#[cfg(test)]
mod routing;
