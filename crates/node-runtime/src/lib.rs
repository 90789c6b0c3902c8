//! # Channel Node Runtime
//!
//! Assembles the four subsystems into a running payment-channel node.
//!
//! ```text
//!   peer HTTP ──> MessageDispatcher (4) ──> ChannelLifecycleService (3)
//!                       │                          │
//!                       ├──> ProposalResolver (2)  └──> SettlementContract
//!                       └──> PeerTransportService (1)
//!
//!   driver ──> ChannelNode ──> lifecycle, then notify via resolver + transport
//! ```
//!
//! ## Modules
//!
//! - `config` - layered configuration (defaults, TOML, `CN_*` env, flags)
//! - `logging` - tracing subscriber setup
//! - `node` - the driver-facing facade
//! - `server` - HTTP peer endpoint
//! - `maintenance` - periodic probing and garbage collection
//! - `runtime` - task ownership and graceful shutdown

pub mod config;
pub mod logging;
pub mod maintenance;
pub mod node;
pub mod runtime;
pub mod server;

pub use config::{ConfigError, NodeConfig};
pub use node::{
    ChannelNode, MaintenanceReport, NodeComponents, NodeError, NodeStatus, Notified, PeerRemoval,
};
pub use runtime::NodeRuntime;
