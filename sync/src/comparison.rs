//! Chain comparison: where, and whether, a peer's chain diverges from ours.

use std::fmt;

use nis_crypto::{hash_block, verify_block};
use nis_ledger::BlockScorer;
use nis_types::{Block, BlockHeight};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lookup::BlockLookup;
use crate::SyncError;

/// Maximum number of hashes a peer may return, by default.
pub const DEFAULT_MAX_BLOCKS_TO_ANALYZE: usize = 1440;

/// Maximum rollback depth, by default.
pub const DEFAULT_MAX_BLOCKS_TO_REWRITE: u64 = 360;

/// Bounds on one comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonContext {
    /// More hashes than this from a peer is treated as flooding.
    pub max_blocks_to_analyze: usize,
    /// Deepest rollback a reorganization may perform.
    pub max_blocks_to_rewrite: u64,
}

impl ComparisonContext {
    pub fn new(max_blocks_to_analyze: usize, max_blocks_to_rewrite: u64) -> Self {
        Self {
            max_blocks_to_analyze,
            max_blocks_to_rewrite,
        }
    }
}

impl Default for ComparisonContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCKS_TO_ANALYZE, DEFAULT_MAX_BLOCKS_TO_REWRITE)
    }
}

/// Outcome of comparing the local chain with a peer's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonResult {
    RemoteHasNoBlocks,
    /// The peer sent a block whose signature does not verify.
    RemoteHasNonVerifiableBlock,
    RemoteIsSynced,
    /// Adopting the peer's chain would roll back more than the rewrite limit.
    RemoteIsTooFarBehind,
    RemoteReturnedTooManyHashes,
    /// The peer's hashes share no prefix with ours.
    RemoteReturnedInvalidHashes,
    /// The peer claimed a higher score but has nothing we lack.
    RemoteLiedAboutChainScore,
    RemoteReportedEqualChainScore,
    RemoteReportedLowerChainScore,
    /// The peer's first diverging block does not beat ours.
    RemoteForkNotBetter,
    /// The peer has blocks we should try to adopt.
    RemoteIsNotSynced {
        common_block_height: BlockHeight,
        /// `true` when our chain ends at the common block, so nothing needs
        /// rolling back.
        chains_consistent: bool,
    },
}

impl ComparisonResult {
    /// Results that mark the peer as malicious.
    pub fn is_evil(&self) -> bool {
        matches!(
            self,
            Self::RemoteHasNonVerifiableBlock
                | Self::RemoteReturnedTooManyHashes
                | Self::RemoteReturnedInvalidHashes
                | Self::RemoteLiedAboutChainScore
        )
    }

    pub fn common_block_height(&self) -> Option<BlockHeight> {
        match self {
            Self::RemoteIsNotSynced {
                common_block_height,
                ..
            } => Some(*common_block_height),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteHasNoBlocks => f.write_str("remote has no blocks"),
            Self::RemoteHasNonVerifiableBlock => f.write_str("remote has non-verifiable block"),
            Self::RemoteIsSynced => f.write_str("remote is synced"),
            Self::RemoteIsTooFarBehind => f.write_str("remote is too far behind"),
            Self::RemoteReturnedTooManyHashes => f.write_str("remote returned too many hashes"),
            Self::RemoteReturnedInvalidHashes => f.write_str("remote returned invalid hashes"),
            Self::RemoteLiedAboutChainScore => f.write_str("remote lied about chain score"),
            Self::RemoteReportedEqualChainScore => f.write_str("remote reported equal chain score"),
            Self::RemoteReportedLowerChainScore => f.write_str("remote reported lower chain score"),
            Self::RemoteForkNotBetter => f.write_str("remote fork is not better"),
            Self::RemoteIsNotSynced {
                common_block_height,
                chains_consistent,
            } => write!(
                f,
                "remote is not synced (common height {common_block_height}, consistent {chains_consistent})"
            ),
        }
    }
}

/// Compares two chains. Read-only: the only effects are the lookups it
/// makes, so repeating a comparison without intervening changes repeats the
/// result.
pub struct BlockChainComparer<'a> {
    context: ComparisonContext,
    scorer: &'a dyn BlockScorer,
}

impl<'a> BlockChainComparer<'a> {
    pub fn new(context: ComparisonContext, scorer: &'a dyn BlockScorer) -> Self {
        Self { context, scorer }
    }

    pub fn context(&self) -> &ComparisonContext {
        &self.context
    }

    pub fn compare(
        &self,
        local: &dyn BlockLookup,
        remote: &dyn BlockLookup,
    ) -> Result<ComparisonResult, SyncError> {
        let local_last = local.last_block()?.ok_or(SyncError::NoLocalBlocks)?;

        let Some(remote_last) = remote.last_block()? else {
            return Ok(ComparisonResult::RemoteHasNoBlocks);
        };
        if !verify_block(&remote_last) {
            return Ok(ComparisonResult::RemoteHasNonVerifiableBlock);
        }
        if is_same_block(&local_last, &remote_last) {
            return Ok(ComparisonResult::RemoteIsSynced);
        }

        let local_score = local.chain_score()?;
        let remote_score = remote.chain_score()?;
        let mut remote_promises_more = false;
        if let (Some(ours), Some(theirs)) = (local_score, remote_score) {
            if theirs < ours {
                return Ok(ComparisonResult::RemoteReportedLowerChainScore);
            }
            if theirs == ours {
                return Ok(ComparisonResult::RemoteReportedEqualChainScore);
            }
            remote_promises_more = true;
        }

        let local_height = local_last.height.raw();
        let remote_height = remote_last.height.raw();
        if local_height.saturating_sub(remote_height) > self.context.max_blocks_to_rewrite {
            return Ok(ComparisonResult::RemoteIsTooFarBehind);
        }

        let start = local_height
            .saturating_sub(self.context.max_blocks_to_rewrite)
            .max(1);
        let start_height = BlockHeight::new(start);
        let remote_hashes = remote.hashes_from(start_height, self.context.max_blocks_to_analyze)?;
        if remote_hashes.len() > self.context.max_blocks_to_analyze {
            return Ok(ComparisonResult::RemoteReturnedTooManyHashes);
        }
        let local_hashes = local.hashes_from(start_height, self.context.max_blocks_to_analyze)?;

        let first_difference = local_hashes.common_prefix_len(&remote_hashes);
        if first_difference == 0 {
            return Ok(ComparisonResult::RemoteReturnedInvalidHashes);
        }
        if first_difference == remote_hashes.len() {
            return Ok(if remote_promises_more {
                ComparisonResult::RemoteLiedAboutChainScore
            } else {
                ComparisonResult::RemoteIsSynced
            });
        }

        let common = BlockHeight::new(start + first_difference as u64 - 1);
        let has_own_chain = local_hashes.len() > first_difference;
        debug!(%common, has_own_chain, "chains diverge");

        let remote_block = match remote.block_at(common.next())? {
            Some(block) if verify_block(&block) => block,
            _ => return Ok(ComparisonResult::RemoteHasNonVerifiableBlock),
        };
        if has_own_chain && !self.remote_fork_is_better(local, common, &remote_block)? {
            return Ok(ComparisonResult::RemoteForkNotBetter);
        }

        Ok(ComparisonResult::RemoteIsNotSynced {
            common_block_height: common,
            chains_consistent: !has_own_chain,
        })
    }

    /// Scores the first diverging blocks against their shared parent. The
    /// remote block is rescored with our block's difficulty: both follow the
    /// same parent, so a node derives the same difficulty for either, and the
    /// peer's own value is never trusted.
    fn remote_fork_is_better(
        &self,
        local: &dyn BlockLookup,
        common: BlockHeight,
        remote_block: &Block,
    ) -> Result<bool, SyncError> {
        let (Some(parent), Some(ours)) = (local.block_at(common)?, local.block_at(common.next())?)
        else {
            return Ok(true);
        };
        let mut theirs = remote_block.clone();
        theirs.difficulty = ours.difficulty;

        let our_score = self.scorer.calculate_block_score(&parent, &ours);
        let their_score = self.scorer.calculate_block_score(&parent, &theirs);
        Ok(their_score > our_score)
    }
}

fn is_same_block(a: &Block, b: &Block) -> bool {
    a.height == b.height && a.signature == b.signature && hash_block(a) == hash_block(b)
}
