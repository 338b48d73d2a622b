//! The requests chain synchronization makes of a remote peer.

use serde::{Deserialize, Serialize};

use nis_types::{Block, BlockHeight, ChainScore, HashChain, Transaction, TxHash};

use crate::{NetworkError, Peer};

/// Maximum number of blocks a peer returns for one chain request.
pub const BLOCKS_LIMIT: u32 = 1440;

/// Maximum number of transactions a peer returns for one chain request.
pub const TRANSACTIONS_LIMIT: u32 = 10_000;

const MIN_BLOCKS: u32 = 10;
const MIN_TRANSACTIONS: u32 = 120;
const EXTRA_BLOCKS: u32 = 100;

/// Request for the blocks following `height` on a peer's chain.
///
/// The peer returns at least `min_blocks` blocks (if it has them) and keeps
/// adding blocks up to [`ChainRequest::num_blocks`] while the transaction
/// total stays within `max_transactions`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRequest {
    height: BlockHeight,
    min_blocks: u32,
    max_transactions: u32,
}

impl ChainRequest {
    /// Both limits are clamped to what peers are willing to serve.
    pub fn new(height: BlockHeight, min_blocks: u32, max_transactions: u32) -> Self {
        Self {
            height,
            min_blocks: min_blocks.clamp(MIN_BLOCKS, BLOCKS_LIMIT),
            max_transactions: max_transactions.clamp(MIN_TRANSACTIONS, TRANSACTIONS_LIMIT),
        }
    }

    /// Height of the last block the requester already has.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn min_blocks(&self) -> u32 {
        self.min_blocks
    }

    pub fn max_transactions(&self) -> u32 {
        self.max_transactions
    }

    /// Upper bound on the number of blocks in the response.
    pub fn num_blocks(&self) -> u32 {
        (self.min_blocks + EXTRA_BLOCKS).min(BLOCKS_LIMIT)
    }
}

/// Blocking transport to a remote peer.
///
/// Absent data is `Ok(None)` or an empty collection. `Err` means the exchange
/// itself failed (timeout, disconnect, garbled response); callers treat it as
/// an ordinary failure with no side effects. Timeouts are the
/// implementation's responsibility.
pub trait SyncConnector: Send + Sync {
    fn last_block(&self, peer: &Peer) -> Result<Option<Block>, NetworkError>;

    /// Hashes of the peer's blocks starting at `height`, ascending.
    fn hashes_from(&self, peer: &Peer, height: BlockHeight) -> Result<HashChain, NetworkError>;

    fn block_at(&self, peer: &Peer, height: BlockHeight) -> Result<Option<Block>, NetworkError>;

    /// Blocks strictly above `request.height()`, ascending.
    fn chain_after(&self, peer: &Peer, request: &ChainRequest) -> Result<Vec<Block>, NetworkError>;

    fn chain_score(&self, peer: &Peer) -> Result<ChainScore, NetworkError>;

    /// The peer's unconfirmed transactions, minus those whose hashes are in
    /// `known`.
    fn unconfirmed_transactions(
        &self,
        peer: &Peer,
        known: &[TxHash],
    ) -> Result<Vec<Transaction>, NetworkError>;
}
