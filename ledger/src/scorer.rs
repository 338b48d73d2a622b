//! Block scoring and difficulty calculation.

use nis_types::{Block, BlockDifficulty, Timestamp};

/// Target number of seconds between blocks.
pub const TARGET_BLOCK_TIME_SECS: u64 = 60;

/// Default number of blocks considered when deriving a difficulty.
pub const DIFFICULTY_WINDOW: usize = 60;

/// Scores a block relative to its parent. Chain score is the sum of the
/// scores of its blocks.
pub trait BlockScorer: Send + Sync {
    fn calculate_block_score(&self, parent: &Block, block: &Block) -> u64;
}

/// Score is the block's difficulty minus the seconds elapsed since its
/// parent, floored at zero. Faster blocks on harder chains score higher.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBlockScorer;

impl BlockScorer for DefaultBlockScorer {
    fn calculate_block_score(&self, parent: &Block, block: &Block) -> u64 {
        let elapsed = block.timestamp.elapsed_since(parent.timestamp);
        block.difficulty.raw().saturating_sub(elapsed)
    }
}

/// Derives the difficulty of the next block from a window of preceding
/// blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockDifficultyScorer;

impl BlockDifficultyScorer {
    /// `difficulties` and `timestamps` describe the same consecutive blocks,
    /// oldest first.
    ///
    /// The average difficulty is scaled by how far the observed block time
    /// deviates from [`TARGET_BLOCK_TIME_SECS`], limited to a 5% change per
    /// block and then clamped to the global difficulty bounds.
    pub fn calculate_difficulty(
        &self,
        difficulties: &[BlockDifficulty],
        timestamps: &[Timestamp],
    ) -> BlockDifficulty {
        let count = difficulties.len().min(timestamps.len());
        if count < 2 {
            return BlockDifficulty::INITIAL;
        }
        let difficulties = &difficulties[difficulties.len() - count..];
        let timestamps = &timestamps[timestamps.len() - count..];

        let time_diff = timestamps[count - 1]
            .elapsed_since(timestamps[0])
            .max(1) as u128;
        let sum: u128 = difficulties.iter().map(|d| d.raw() as u128).sum();
        let average = sum / count as u128;

        let mut solved =
            average * TARGET_BLOCK_TIME_SECS as u128 * (count as u128 - 1) / time_diff;
        if solved * 20 > average * 21 {
            solved = average * 21 / 20;
        }
        if solved * 20 < average * 19 {
            solved = average * 19 / 20;
        }

        BlockDifficulty::new(u64::try_from(solved).unwrap_or(u64::MAX))
    }
}
