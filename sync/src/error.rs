use nis_ledger::LedgerError;
use nis_network::NetworkError;
use nis_store::StoreError;
use nis_types::BlockHeight;
use thiserror::Error;

use crate::comparison::ComparisonResult;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The local chain is empty; a node always holds at least its nemesis
    /// block.
    #[error("local chain has no blocks")]
    NoLocalBlocks,

    #[error("local block at height {0} is missing from storage")]
    MissingLocalBlock(BlockHeight),

    #[error("rolling back {requested} blocks exceeds the rewrite limit of {limit}")]
    RewriteLimitExceeded { requested: u64, limit: u64 },

    /// The peer behaved maliciously and should be penalised.
    #[error("remote node is evil: {0}")]
    FatalPeer(ComparisonResult),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether the error calls for penalising the peer rather than just
    /// ignoring the interaction.
    pub fn is_fatal_peer(&self) -> bool {
        matches!(self, Self::FatalPeer(_))
    }
}
