//! # Node Configuration
//!
//! Unified configuration for every subsystem. Sources, later wins:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config` / `CN_CONFIG`)
//! 3. `CN_*` environment variables
//! 4. Command-line flags (applied by the binary)

use cn_01_peer_transport::TransportConfig;
use cn_03_channel_lifecycle::ChannelConfig;
use cn_04_message_dispatcher::DispatchConfig;
use serde::Deserialize;
use shared_types::PeerAddress;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub transport: TransportConfig,
    pub channel: ChannelConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Socket the peer endpoint binds to.
    pub listen_addr: String,
    /// Address other nodes use to reach this one.
    pub advertised_addr: String,
    /// Peers to connect to at startup.
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            advertised_addr: "http://127.0.0.1:4000".to_string(),
            bootstrap_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Hex secp256k1 secret key. A random key is generated when absent.
    pub secret_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Defaults, overlaid with `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `CN_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CN_*` overrides from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("CN_LISTEN_ADDR") {
            self.network.listen_addr = v;
        }
        if let Some(v) = lookup("CN_ADVERTISED_ADDR") {
            self.network.advertised_addr = v;
        }
        if let Some(v) = lookup("CN_BOOTSTRAP_PEERS") {
            self.network.bootstrap_peers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("CN_SECRET_KEY") {
            self.keys.secret_key = Some(v);
        }
        if let Some(v) = lookup("CN_CHALLENGE_PERIOD") {
            self.channel.challenge_period = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CN_CHALLENGE_PERIOD",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("CN_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_socket()?;
        self.advertised_address()?;
        for peer in &self.network.bootstrap_peers {
            PeerAddress::parse(peer)
                .map_err(|_| ConfigError::Invalid(format!("bootstrap peer {peer:?}")))?;
        }

        let t = &self.transport;
        let timeouts = [
            ("transport.request_timeout_ms", t.request_timeout_ms),
            ("transport.connect_timeout_ms", t.connect_timeout_ms),
            ("transport.health_timeout_ms", t.health_timeout_ms),
            ("transport.liveness_timeout_ms", t.liveness_timeout_ms),
            ("transport.probe_interval_ms", t.probe_interval_ms),
            ("dispatch.max_age_ms", self.dispatch.max_age_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        if self.dispatch.window_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.window_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_socket(&self) -> Result<SocketAddr, ConfigError> {
        self.network.listen_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!("listen address {:?}", self.network.listen_addr))
        })
    }

    pub fn advertised_address(&self) -> Result<PeerAddress, ConfigError> {
        PeerAddress::parse(&self.network.advertised_addr).map_err(|_| {
            ConfigError::Invalid(format!(
                "advertised address {:?}",
                self.network.advertised_addr
            ))
        })
    }
}
