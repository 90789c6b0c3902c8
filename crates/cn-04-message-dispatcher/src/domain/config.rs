use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Message ids remembered for duplicate suppression.
    pub window_capacity: usize,
    /// Records older than this are evicted regardless of capacity.
    pub max_age_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            window_capacity: 1_000,
            max_age_ms: 600_000,
        }
    }
}

impl DispatchConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}
