//! Lifecycle settings.

use serde::Deserialize;

/// Default challenge window in blocks.
pub const DEFAULT_CHALLENGE_PERIOD: u64 = 24;

/// Default age after which an unmaterialised proposal is purged (24 h).
pub const DEFAULT_STALE_PROPOSAL_AGE_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Blocks after `closing_block` during which withdraw is refused.
    pub challenge_period: u64,
    /// PROPOSED/ACCEPTED proposals older than this are garbage-collected.
    pub stale_proposal_age_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            challenge_period: DEFAULT_CHALLENGE_PERIOD,
            stale_proposal_age_ms: DEFAULT_STALE_PROPOSAL_AGE_MS,
        }
    }
}
