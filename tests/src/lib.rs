//! # Channel-Node Test Suite
//!
//! Cross-subsystem tests that run several complete nodes in one process.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs       # cluster of nodes on one network and ledger
//!     ├── channel_flow.rs   # propose -> fund -> pay -> close -> withdraw
//!     ├── delivery.rs       # duplicates, lost messages, catch-up
//!     ├── routing.rs        # resolver routes, disconnects, expiry
//!     └── http_wire.rs      # two nodes over real sockets
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cn-tests
//! cargo test -p cn-tests integration::routing::
//! ```

pub mod integration;
