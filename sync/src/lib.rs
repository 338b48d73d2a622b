//! Block-chain synchronization and fork resolution.
//!
//! A node periodically asks [`BlockChainUpdater::update_chain`] to compare
//! its chain with a peer's. When the peer holds a better chain the updater
//! fetches it, rolls back local blocks past the last common block if needed,
//! validates the candidate on an isolated ledger snapshot and, if it scores
//! higher than what it replaces, commits it atomically. Blocks pushed by
//! peers go through [`BlockChainUpdater::update_block`].
//!
//! Peers that send unverifiable data, flood hashes or lie about their chain
//! score are reported as [`SyncError::FatalPeer`].

pub mod comparison;
pub mod config;
pub mod error;
pub mod events;
pub mod lookup;
pub mod result;
pub mod rollback;
pub mod service;
pub mod spans;
pub mod stats;
pub mod unconfirmed;
pub mod update_context;
pub mod updater;

pub use comparison::{
    BlockChainComparer, ComparisonContext, ComparisonResult, DEFAULT_MAX_BLOCKS_TO_ANALYZE,
    DEFAULT_MAX_BLOCKS_TO_REWRITE,
};
pub use config::SyncConfig;
pub use error::SyncError;
pub use events::{ChainEvent, ChainEventBus};
pub use lookup::{BlockLookup, LocalBlockLookup, RemoteBlockLookup};
pub use result::{NodeInteractionResult, UpdateOutcome};
pub use rollback::{Rollback, RollbackEngine};
pub use service::SyncService;
pub use stats::SyncStats;
pub use unconfirmed::{DefaultUnconfirmedTransactions, UnconfirmedTransactions};
pub use update_context::{AcceptedChain, BlockChainUpdateContext, ContextResult};
pub use updater::{BlockChainUpdater, UpdaterPhase};
