//! Unwinding local blocks on a snapshot.

use nis_ledger::{BlockExecutor, BlockScorer, StateSnapshot};
use nis_store::BlockDao;
use nis_types::{Block, BlockHeight, ChainScore, Transaction};
use tracing::{debug, info};

use crate::spans::rollback_span;
use crate::SyncError;

/// What unwinding removed.
#[derive(Debug, Default)]
pub struct Rollback {
    /// Total score of the unwound blocks.
    pub score: ChainScore,
    /// Transactions of the unwound blocks, oldest block first.
    pub reverted_transactions: Vec<Transaction>,
    pub blocks_reverted: u64,
    /// The unwound blocks as they were stored, ascending. Written back if
    /// the replacement chain cannot be persisted.
    pub blocks: Vec<Block>,
}

/// Reverts persisted blocks on a [`StateSnapshot`].
///
/// Blocks are always read back from storage, so a retry after a failed
/// attempt sees exactly the same input.
pub struct RollbackEngine<'a> {
    dao: &'a dyn BlockDao,
    executor: BlockExecutor,
    scorer: &'a dyn BlockScorer,
    max_blocks_to_rewrite: u64,
}

impl<'a> RollbackEngine<'a> {
    pub fn new(
        dao: &'a dyn BlockDao,
        executor: BlockExecutor,
        scorer: &'a dyn BlockScorer,
        max_blocks_to_rewrite: u64,
    ) -> Self {
        Self {
            dao,
            executor,
            scorer,
            max_blocks_to_rewrite,
        }
    }

    /// Undo every block above `common` so the snapshot looks as if `common`
    /// were the tip. Refuses, leaving the snapshot untouched, when that means
    /// rolling back more than the rewrite limit.
    pub fn unwind_to(
        &self,
        snapshot: &mut StateSnapshot,
        common: BlockHeight,
    ) -> Result<Rollback, SyncError> {
        let last = self.dao.last_block()?.ok_or(SyncError::NoLocalBlocks)?;
        let depth = last.height.blocks_above(common);
        if depth > self.max_blocks_to_rewrite {
            return Err(SyncError::RewriteLimitExceeded {
                requested: depth,
                limit: self.max_blocks_to_rewrite,
            });
        }
        if depth == 0 {
            return Ok(Rollback::default());
        }

        let span = rollback_span(common, depth);
        let _enter = span.enter();

        // Parent first, then every block to unwind, all read before the
        // snapshot is touched.
        let mut blocks: Vec<Block> = Vec::with_capacity(depth as usize + 1);
        for raw in common.raw()..=last.height.raw() {
            let height = BlockHeight::new(raw);
            let block = self
                .dao
                .find_by_height(height)?
                .ok_or(SyncError::MissingLocalBlock(height))?;
            blocks.push(block);
        }

        let mut score = ChainScore::ZERO;
        for pair in blocks.windows(2).rev() {
            let (parent, block) = (&pair[0], &pair[1]);
            self.executor.undo(snapshot, block)?;
            score += ChainScore::from(self.scorer.calculate_block_score(parent, block));
            debug!(height = %block.height, "unwound block");
        }

        blocks.remove(0);
        let reverted_transactions: Vec<Transaction> = blocks
            .iter()
            .flat_map(|b| b.transactions.iter().cloned())
            .collect();
        info!(
            blocks = depth,
            transactions = reverted_transactions.len(),
            %score,
            "rolled back local chain"
        );
        Ok(Rollback {
            score,
            reverted_transactions,
            blocks_reverted: depth,
            blocks,
        })
    }
}
