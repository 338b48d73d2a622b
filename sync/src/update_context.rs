//! Evaluating a candidate chain on top of a local parent block.

use std::collections::VecDeque;

use nis_crypto::generation_hash;
use nis_ledger::{
    BlockDifficultyScorer, BlockScorer, ChainValidator, LedgerState, StateSnapshot,
    ValidationResult,
};
use nis_store::BlockDao;
use nis_types::{Block, BlockDifficulty, BlockHeight, ChainScore, Timestamp};
use tracing::debug;

use crate::result::UpdateOutcome;
use crate::SyncError;

/// A candidate chain that outscored the blocks it replaces.
#[derive(Debug)]
pub struct AcceptedChain {
    pub state: LedgerState,
    pub blocks: Vec<Block>,
}

#[derive(Debug)]
pub struct ContextResult {
    pub outcome: UpdateOutcome,
    /// Present only when `outcome.validation_result` is `Success`.
    pub accepted: Option<AcceptedChain>,
}

/// One candidate chain, the local block it attaches to and the snapshot it is
/// executed on.
///
/// Blocks received from a peer carry the peer's idea of the derived fields.
/// Both the previous generation hash and the difficulty are recomputed here
/// from local data before anything else looks at them.
pub struct BlockChainUpdateContext<'a> {
    dao: &'a dyn BlockDao,
    validator: &'a dyn ChainValidator,
    scorer: &'a dyn BlockScorer,
    difficulty_window: usize,
    snapshot: StateSnapshot,
    parent: Block,
    peer_chain: Vec<Block>,
    our_score: ChainScore,
}

impl<'a> BlockChainUpdateContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dao: &'a dyn BlockDao,
        validator: &'a dyn ChainValidator,
        scorer: &'a dyn BlockScorer,
        difficulty_window: usize,
        snapshot: StateSnapshot,
        parent: Block,
        peer_chain: Vec<Block>,
        our_score: ChainScore,
    ) -> Self {
        Self {
            dao,
            validator,
            scorer,
            difficulty_window,
            snapshot,
            parent,
            peer_chain,
            our_score,
        }
    }

    pub fn update(mut self) -> Result<ContextResult, SyncError> {
        self.relink();
        self.derive_difficulties()?;

        let result = self
            .validator
            .is_chain_valid(&mut self.snapshot, &self.parent, &self.peer_chain);
        if !result.is_success() {
            debug!(%result, blocks = self.peer_chain.len(), "peer chain failed validation");
            return Ok(self.rejected(result, ChainScore::ZERO));
        }

        let peer_score = self.peer_score();
        if peer_score.is_zero() {
            return Ok(self.rejected(ValidationResult::FailureChainInvalid, peer_score));
        }
        if peer_score <= self.our_score {
            debug!(%peer_score, our_score = %self.our_score, "peer chain is not better");
            return Ok(self.rejected(ValidationResult::Neutral, peer_score));
        }

        Ok(ContextResult {
            outcome: UpdateOutcome::new(ValidationResult::Success, self.our_score, peer_score),
            accepted: Some(AcceptedChain {
                state: self.snapshot.into_state(),
                blocks: self.peer_chain,
            }),
        })
    }

    fn rejected(&self, result: ValidationResult, peer_score: ChainScore) -> ContextResult {
        ContextResult {
            outcome: UpdateOutcome::new(result, self.our_score, peer_score),
            accepted: None,
        }
    }

    fn relink(&mut self) {
        let mut previous = self.parent.clone();
        for block in &mut self.peer_chain {
            block.previous_generation_hash =
                generation_hash(&previous.previous_generation_hash, &previous.signer);
            previous = block.clone();
        }
    }

    fn derive_difficulties(&mut self) -> Result<(), SyncError> {
        let window = self.difficulty_window.max(1);
        let parent_height = self.parent.height.raw();
        let start = parent_height
            .saturating_sub(window as u64 - 1)
            .max(BlockHeight::ONE.raw());
        let limit = (parent_height - start + 1) as usize;

        let start = BlockHeight::new(start);
        let mut timestamps: VecDeque<Timestamp> =
            self.dao.timestamps_from(start, limit)?.into_iter().collect();
        let mut difficulties: VecDeque<BlockDifficulty> =
            self.dao.difficulties_from(start, limit)?.into_iter().collect();

        for block in &mut self.peer_chain {
            block.difficulty = BlockDifficultyScorer.calculate_difficulty(
                difficulties.make_contiguous(),
                timestamps.make_contiguous(),
            );
            difficulties.push_back(block.difficulty);
            timestamps.push_back(block.timestamp);
            if difficulties.len() > window {
                difficulties.pop_front();
                timestamps.pop_front();
            }
        }
        Ok(())
    }

    fn peer_score(&self) -> ChainScore {
        let mut parent = &self.parent;
        let mut score = ChainScore::ZERO;
        for block in &self.peer_chain {
            score += ChainScore::from(self.scorer.calculate_block_score(parent, block));
            parent = block;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nis_ledger::{BlockExecutor, DefaultBlockScorer, DefaultChainValidator};
    use nis_nullables::{NullBlockDao, NullChainBuilder};
    use nis_types::BlockHash;

    struct Fixture {
        builder: NullChainBuilder,
        local: Vec<Block>,
        dao: NullBlockDao,
        validator: DefaultChainValidator,
    }

    fn fixture(height: u64) -> Fixture {
        let builder = NullChainBuilder::new();
        let local = builder.chain(height);
        let dao = NullBlockDao::with_chain(&local).unwrap();
        let validator = DefaultChainValidator::new(BlockExecutor::new(builder.network()));
        Fixture {
            builder,
            local,
            dao,
            validator,
        }
    }

    impl Fixture {
        fn context(&self, peer_chain: Vec<Block>, our_score: ChainScore) -> BlockChainUpdateContext<'_> {
            let state = self.builder.state_after(&self.local).unwrap();
            let parent = self.local[self.local.len() - 1].clone();
            BlockChainUpdateContext::new(
                &self.dao,
                &self.validator,
                &DefaultBlockScorer,
                60,
                state.snapshot(),
                parent,
                peer_chain,
                our_score,
            )
        }
    }

    #[test]
    fn better_chain_is_accepted_with_its_score() {
        let f = fixture(5);
        let peer = f.builder.extend(&f.local, 2, 1, 60);
        let expected: ChainScore = std::iter::once(&f.local[4])
            .chain(peer.iter())
            .collect::<Vec<_>>()
            .windows(2)
            .map(|p| ChainScore::from(DefaultBlockScorer.calculate_block_score(p[0], p[1])))
            .sum();

        let result = f.context(peer.clone(), ChainScore::ZERO).update().unwrap();
        assert_eq!(result.outcome.validation_result, ValidationResult::Success);
        assert_eq!(result.outcome.peer_score, expected);
        let accepted = result.accepted.unwrap();
        assert_eq!(accepted.blocks, peer);
        assert_eq!(accepted.state.fingerprint(), {
            let mut all = f.local.clone();
            all.extend(peer);
            f.builder.state_after(&all).unwrap().fingerprint()
        });
    }

    #[test]
    fn derived_fields_are_recomputed_locally() {
        let f = fixture(5);
        let honest = f.builder.extend(&f.local, 2, 1, 60);
        let mut tampered = honest.clone();
        for block in &mut tampered {
            block.previous_generation_hash = BlockHash::new([7u8; 32]);
            block.difficulty = BlockDifficulty::MAX;
        }

        let result = f.context(tampered, ChainScore::ZERO).update().unwrap();
        let accepted = result.accepted.unwrap();
        assert_eq!(accepted.blocks, honest);
    }

    #[test]
    fn chain_not_better_than_ours_is_neutral() {
        let f = fixture(5);
        let peer = f.builder.extend(&f.local, 1, 1, 60);
        let result = f.context(peer, ChainScore::from(u64::MAX)).update().unwrap();
        assert_eq!(result.outcome.validation_result, ValidationResult::Neutral);
        assert!(result.outcome.is_score_inferior());
        assert!(result.accepted.is_none());
    }

    #[test]
    fn invalid_chain_reports_validator_result() {
        let f = fixture(5);
        let mut peer = f.builder.extend(&f.local, 1, 1, 60);
        peer[0].timestamp = peer[0].timestamp.add_secs(1);

        let result = f.context(peer, ChainScore::ZERO).update().unwrap();
        assert_eq!(
            result.outcome.validation_result,
            ValidationResult::FailureBlockUnverifiable
        );
        assert!(result.outcome.peer_score.is_zero());
        assert!(!result.outcome.is_score_inferior());
    }

    #[test]
    fn empty_chain_is_invalid() {
        let f = fixture(3);
        let result = f.context(Vec::new(), ChainScore::ZERO).update().unwrap();
        assert_eq!(result.outcome.validation_result, ValidationResult::FailureChainInvalid);
    }
}
