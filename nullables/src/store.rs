//! Nullable block store: thread-safe in-memory chain storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use nis_crypto::hash_block;
use nis_store::{BlockDao, StoreError};
use nis_types::{Block, BlockDifficulty, BlockHash, BlockHeight, HashChain, Timestamp};
use parking_lot::{Mutex, RwLock};

#[derive(Default)]
struct Chain {
    /// `blocks[i]` sits at height `i + 1`.
    blocks: Vec<Block>,
    hashes: Vec<BlockHash>,
    by_hash: HashMap<BlockHash, BlockHeight>,
}

impl Chain {
    fn index(height: BlockHeight) -> Option<usize> {
        (height.raw() as usize).checked_sub(1)
    }

    fn range(&self, height: BlockHeight, limit: usize) -> std::ops::Range<usize> {
        let start = Self::index(height).unwrap_or(0).min(self.blocks.len());
        let end = start.saturating_add(limit).min(self.blocks.len());
        start..end
    }
}

/// An in-memory [`BlockDao`]. Counts writes so tests can assert that an
/// operation left storage untouched, and can be switched into a failing mode.
#[derive(Default)]
pub struct NullBlockDao {
    chain: RwLock<Chain>,
    saves: AtomicU64,
    deletes: AtomicU64,
    failing: AtomicBool,
    /// Saves left to succeed before one fails.
    save_failure: Mutex<Option<u64>>,
}

impl NullBlockDao {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `blocks`, which must start at height 1.
    pub fn with_chain(blocks: &[Block]) -> Result<Self, StoreError> {
        let dao = Self::new();
        for block in blocks {
            dao.save(block)?;
        }
        dao.saves.store(0, Ordering::SeqCst);
        Ok(dao)
    }

    /// Number of `save` calls since construction.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of `delete_blocks_after` calls since construction.
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total number of writes of either kind.
    pub fn write_count(&self) -> u64 {
        self.save_count() + self.delete_count()
    }

    /// Make every subsequent call fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Let the next `successes` saves through, then fail exactly one.
    pub fn fail_save_after(&self, successes: u64) {
        *self.save_failure.lock() = Some(successes);
    }

    /// Copy of every stored block, ascending.
    pub fn blocks(&self) -> Vec<Block> {
        self.chain.read().blocks.clone()
    }

    pub fn height(&self) -> u64 {
        self.chain.read().blocks.len() as u64
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store set to fail".into()));
        }
        Ok(())
    }

    fn check_save(&self) -> Result<(), StoreError> {
        let mut remaining = self.save_failure.lock();
        match *remaining {
            Some(0) => {
                *remaining = None;
                Err(StoreError::Backend("null store save failed".into()))
            }
            Some(n) => {
                *remaining = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl BlockDao for NullBlockDao {
    fn find_by_height(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        self.check()?;
        let chain = self.chain.read();
        Ok(Chain::index(height).and_then(|i| chain.blocks.get(i).cloned()))
    }

    fn find_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StoreError> {
        self.check()?;
        let chain = self.chain.read();
        Ok(chain
            .by_hash
            .get(hash)
            .and_then(|h| Chain::index(*h))
            .and_then(|i| chain.blocks.get(i).cloned()))
    }

    fn last_block(&self) -> Result<Option<Block>, StoreError> {
        self.check()?;
        Ok(self.chain.read().blocks.last().cloned())
    }

    fn hashes_from(&self, height: BlockHeight, limit: usize) -> Result<HashChain, StoreError> {
        self.check()?;
        let chain = self.chain.read();
        Ok(HashChain::new(chain.hashes[chain.range(height, limit)].to_vec()))
    }

    fn timestamps_from(
        &self,
        height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<Timestamp>, StoreError> {
        self.check()?;
        let chain = self.chain.read();
        Ok(chain.blocks[chain.range(height, limit)]
            .iter()
            .map(|b| b.timestamp)
            .collect())
    }

    fn difficulties_from(
        &self,
        height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<BlockDifficulty>, StoreError> {
        self.check()?;
        let chain = self.chain.read();
        Ok(chain.blocks[chain.range(height, limit)]
            .iter()
            .map(|b| b.difficulty)
            .collect())
    }

    fn save(&self, block: &Block) -> Result<(), StoreError> {
        self.check()?;
        self.check_save()?;
        let mut chain = self.chain.write();
        let expected = BlockHeight::new(chain.blocks.len() as u64 + 1);
        if block.height != expected {
            return Err(StoreError::NonContiguous {
                expected,
                actual: block.height,
            });
        }
        let hash = hash_block(block);
        chain.by_hash.insert(hash, block.height);
        chain.hashes.push(hash);
        chain.blocks.push(block.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_blocks_after(&self, height: BlockHeight) -> Result<(), StoreError> {
        self.check()?;
        let mut chain = self.chain.write();
        let keep = (height.raw() as usize).min(chain.blocks.len());
        let removed: Vec<BlockHash> = chain.hashes.drain(keep..).collect();
        for hash in &removed {
            chain.by_hash.remove(hash);
        }
        chain.blocks.truncate(keep);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::NullChainBuilder;

    #[test]
    fn stores_contiguous_chain() {
        let builder = NullChainBuilder::new();
        let chain = builder.chain(5);
        let dao = NullBlockDao::with_chain(&chain).unwrap();

        assert_eq!(dao.height(), 5);
        assert_eq!(dao.save_count(), 0);
        assert_eq!(dao.last_block().unwrap(), chain.last().cloned());
        let hash = hash_block(&chain[2]);
        assert_eq!(dao.find_by_hash(&hash).unwrap(), Some(chain[2].clone()));
        assert_eq!(dao.hashes_from(BlockHeight::new(2), 2).unwrap().len(), 2);
        assert_eq!(dao.hashes_from(BlockHeight::new(4), 10).unwrap().len(), 2);
    }

    #[test]
    fn rejects_gaps() {
        let builder = NullChainBuilder::new();
        let chain = builder.chain(3);
        let dao = NullBlockDao::new();
        dao.save(&chain[0]).unwrap();
        assert!(matches!(
            dao.save(&chain[2]),
            Err(StoreError::NonContiguous { .. })
        ));
    }

    #[test]
    fn delete_after_truncates_and_unindexes() {
        let builder = NullChainBuilder::new();
        let chain = builder.chain(6);
        let dao = NullBlockDao::with_chain(&chain).unwrap();

        dao.delete_blocks_after(BlockHeight::new(3)).unwrap();
        assert_eq!(dao.height(), 3);
        assert!(dao.find_by_hash(&hash_block(&chain[4])).unwrap().is_none());
        assert!(dao.find_by_height(BlockHeight::new(4)).unwrap().is_none());
        assert_eq!(dao.delete_count(), 1);
    }

    #[test]
    fn failing_mode_returns_backend_error() {
        let dao = NullBlockDao::new();
        dao.set_failing(true);
        assert!(matches!(dao.last_block(), Err(StoreError::Backend(_))));
    }

    #[test]
    fn one_shot_save_failure() {
        let builder = NullChainBuilder::new();
        let chain = builder.chain(4);
        let dao = NullBlockDao::new();
        dao.fail_save_after(2);

        dao.save(&chain[0]).unwrap();
        dao.save(&chain[1]).unwrap();
        assert!(matches!(dao.save(&chain[2]), Err(StoreError::Backend(_))));
        assert_eq!(dao.height(), 2);
        dao.save(&chain[2]).unwrap();
        assert_eq!(dao.height(), 3);
    }
}
