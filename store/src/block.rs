//! Block storage trait.

use crate::StoreError;
use nis_types::{Block, BlockDifficulty, BlockHash, BlockHeight, HashChain, Timestamp};

/// Height-indexed storage of the locally accepted chain.
///
/// Persisted blocks carry the generation hash link and difficulty computed by
/// this node, never values received from a peer. Every read returns `Ok(None)`
/// or an empty collection when no data exists; `Err` is reserved for backend
/// faults.
pub trait BlockDao: Send + Sync {
    fn find_by_height(&self, height: BlockHeight) -> Result<Option<Block>, StoreError>;

    fn find_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StoreError>;

    /// The block at the highest stored height.
    fn last_block(&self) -> Result<Option<Block>, StoreError>;

    /// Up to `limit` block hashes starting at `height`, ascending.
    fn hashes_from(&self, height: BlockHeight, limit: usize) -> Result<HashChain, StoreError>;

    /// Up to `limit` block timestamps starting at `height`, ascending.
    fn timestamps_from(&self, height: BlockHeight, limit: usize)
        -> Result<Vec<Timestamp>, StoreError>;

    /// Up to `limit` block difficulties starting at `height`, ascending.
    fn difficulties_from(
        &self,
        height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<BlockDifficulty>, StoreError>;

    /// Append `block` directly above the current last block.
    fn save(&self, block: &Block) -> Result<(), StoreError>;

    /// Remove every block strictly above `height` in one step, so concurrent
    /// readers never observe a partially truncated chain.
    fn delete_blocks_after(&self, height: BlockHeight) -> Result<(), StoreError>;

    /// Whether a block with `hash` is stored.
    fn contains(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.find_by_hash(hash)?.is_some())
    }

    /// Height of the last block, `None` on an empty store.
    fn chain_height(&self) -> Result<Option<BlockHeight>, StoreError> {
        Ok(self.last_block()?.map(|b| b.height))
    }
}
