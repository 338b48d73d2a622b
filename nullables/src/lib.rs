//! Nullable infrastructure for deterministic testing.
//!
//! Block storage and peer transport are abstracted behind traits. This crate
//! provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled and inspected programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod network;
pub mod store;

pub use chain::NullChainBuilder;
pub use network::{NullPeerChain, NullSyncConnector};
pub use store::NullBlockDao;
