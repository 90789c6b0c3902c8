//! Transport timeouts and liveness settings.

use serde::Deserialize;
use std::time::Duration;

/// Timeouts for every peer call plus liveness policy.
///
/// All values are milliseconds so the struct can be read straight out of a
/// TOML `[transport]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound for one `POST /message`.
    pub request_timeout_ms: u64,
    /// Upper bound for the handshake health probe on connect.
    pub connect_timeout_ms: u64,
    /// Upper bound for a periodic health probe.
    pub health_timeout_ms: u64,
    /// A peer not seen for this long is dropped from the registry.
    pub liveness_timeout_ms: u64,
    /// How often the maintenance task probes peers.
    pub probe_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            connect_timeout_ms: 3_000,
            health_timeout_ms: 2_000,
            liveness_timeout_ms: 300_000,
            probe_interval_ms: 30_000,
        }
    }
}

impl TransportConfig {
    /// Config with short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 200,
            connect_timeout_ms: 200,
            health_timeout_ms: 200,
            liveness_timeout_ms: 1_000,
            probe_interval_ms: 100,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}
