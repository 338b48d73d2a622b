//! The chain update orchestrator.
//!
//! [`BlockChainUpdater`] owns the canonical ledger state and chain score and
//! is the only component that writes blocks to storage. Two entry points
//! mutate the chain:
//!
//! - [`BlockChainUpdater::update_chain`] compares the local chain with a
//!   peer's and, if the peer's is better, adopts it (rolling back local blocks
//!   when the chains fork).
//! - [`BlockChainUpdater::update_block`] handles a single pushed block.
//!
//! Comparison runs without holding the update lock. Everything from taking
//! a snapshot to promoting it is serialised by one mutex, so at most one
//! reorganization is ever in flight.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use nis_crypto::{hash_block, hash_transaction};
use nis_ledger::{
    BlockExecutor, BlockScorer, ChainValidator, LedgerState, StateSnapshot, ValidationResult,
};
use nis_network::{ChainRequest, Peer, SyncConnector};
use nis_store::BlockDao;
use nis_types::{Block, BlockHash, BlockHeight, ChainScore, TxHash};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::comparison::{BlockChainComparer, ComparisonResult};
use crate::config::SyncConfig;
use crate::events::{ChainEvent, ChainEventBus};
use crate::lookup::{LocalBlockLookup, RemoteBlockLookup};
use crate::result::{NodeInteractionResult, UpdateOutcome};
use crate::rollback::{Rollback, RollbackEngine};
use crate::spans::{block_update_span, sync_span};
use crate::stats::{self, SyncStats};
use crate::unconfirmed::UnconfirmedTransactions;
use crate::update_context::{AcceptedChain, BlockChainUpdateContext};
use crate::SyncError;

/// Where an update currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdaterPhase {
    #[default]
    Idle,
    Comparing,
    FastAccept,
    Reorganizing,
    Committed,
    Aborted,
}

impl fmt::Display for UpdaterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Comparing => "comparing",
            Self::FastAccept => "fast_accept",
            Self::Reorganizing => "reorganizing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Tracks the phase of one update and returns it to `Idle` when dropped,
/// whichever way the update ends.
struct PhaseGuard<'a> {
    phase: &'a Mutex<UpdaterPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Mutex<UpdaterPhase>, initial: UpdaterPhase) -> Self {
        let guard = Self { phase };
        guard.set(initial);
        guard
    }

    fn set(&self, next: UpdaterPhase) {
        let mut phase = self.phase.lock();
        debug!(from = %*phase, to = %next, "phase");
        *phase = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = UpdaterPhase::Idle;
    }
}

pub struct BlockChainUpdater {
    dao: Arc<dyn BlockDao>,
    connector: Arc<dyn SyncConnector>,
    validator: Arc<dyn ChainValidator>,
    scorer: Arc<dyn BlockScorer>,
    unconfirmed: Arc<dyn UnconfirmedTransactions>,
    executor: BlockExecutor,
    config: SyncConfig,
    state: RwLock<Arc<LedgerState>>,
    score: RwLock<ChainScore>,
    update_lock: Mutex<()>,
    phase: Mutex<UpdaterPhase>,
    events: ChainEventBus,
    stats: SyncStats,
}

impl BlockChainUpdater {
    /// `state` must be the ledger state after executing every block in
    /// `dao`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SyncConfig,
        dao: Arc<dyn BlockDao>,
        connector: Arc<dyn SyncConnector>,
        validator: Arc<dyn ChainValidator>,
        scorer: Arc<dyn BlockScorer>,
        unconfirmed: Arc<dyn UnconfirmedTransactions>,
        state: LedgerState,
    ) -> Self {
        Self {
            executor: config.executor(),
            dao,
            connector,
            validator,
            scorer,
            unconfirmed,
            config,
            state: RwLock::new(Arc::new(state)),
            score: RwLock::new(ChainScore::ZERO),
            update_lock: Mutex::new(()),
            phase: Mutex::new(UpdaterPhase::Idle),
            events: ChainEventBus::new(),
            stats: SyncStats::new(),
        }
    }

    /// Start from a known chain score, e.g. one restored at startup.
    pub fn with_score(self, score: ChainScore) -> Self {
        *self.score.write() = score;
        self
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ChainEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    /// The canonical ledger state. Never blocks on a running update.
    pub fn state(&self) -> Arc<LedgerState> {
        self.state.read().clone()
    }

    pub fn score(&self) -> ChainScore {
        *self.score.read()
    }

    /// Account for a block appended locally, e.g. by our own harvester.
    pub fn update_score(&self, parent: &Block, block: &Block) {
        let added = ChainScore::from(self.scorer.calculate_block_score(parent, block));
        *self.score.write() += added;
    }

    pub fn phase(&self) -> UpdaterPhase {
        *self.phase.lock()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronize with `peer`.
    ///
    /// Returns `Err(SyncError::FatalPeer)` when the peer misbehaved and
    /// should be penalised. Ordinary failures, including transport faults,
    /// are reported as [`NodeInteractionResult::Failure`].
    pub fn update_chain(&self, peer: &Peer) -> Result<NodeInteractionResult, SyncError> {
        let span = sync_span(peer);
        let _enter = span.enter();
        self.stats.increment(stats::ATTEMPTS);

        let phase = PhaseGuard::enter(&self.phase, UpdaterPhase::Comparing);
        let result = self.synchronize(peer, &phase);
        match &result {
            Ok(outcome) => {
                self.stats.increment(match outcome {
                    NodeInteractionResult::Success => stats::SUCCESSES,
                    NodeInteractionResult::Neutral => stats::NEUTRALS,
                    NodeInteractionResult::Failure => stats::FAILURES,
                });
                debug!(%outcome, "synchronization finished");
            }
            Err(SyncError::FatalPeer(reason)) => {
                self.stats.increment(stats::EVIL_PEERS);
                warn!(%reason, "peer is evil");
            }
            Err(e) => warn!(error = %e, "synchronization failed"),
        }
        result
    }

    fn synchronize(
        &self,
        peer: &Peer,
        phase: &PhaseGuard<'_>,
    ) -> Result<NodeInteractionResult, SyncError> {
        let compared_tip = self.dao.last_block()?.ok_or(SyncError::NoLocalBlocks)?;
        let compared_tip = hash_block(&compared_tip);

        let comparison = {
            let comparer =
                BlockChainComparer::new(self.config.comparison_context(), self.scorer.as_ref());
            let local = LocalBlockLookup::new(self.dao.as_ref()).with_score(self.score());
            let remote = RemoteBlockLookup::new(self.connector.as_ref(), peer);
            match comparer.compare(&local, &remote) {
                Ok(result) => result,
                Err(SyncError::Network(e)) => {
                    debug!(error = %e, "comparison aborted by transport");
                    return Ok(NodeInteractionResult::Failure);
                }
                Err(e) => return Err(e),
            }
        };
        debug!(%comparison, "compared chains");

        if comparison.is_evil() {
            return Err(SyncError::FatalPeer(comparison));
        }

        let (common, chains_consistent) = match comparison {
            ComparisonResult::RemoteIsSynced | ComparisonResult::RemoteReportedEqualChainScore => {
                phase.set(UpdaterPhase::FastAccept);
                return Ok(self.pull_unconfirmed(peer));
            }
            ComparisonResult::RemoteIsNotSynced {
                common_block_height,
                chains_consistent,
            } => (common_block_height, chains_consistent),
            other => return Ok(NodeInteractionResult::from_comparison(other)),
        };

        phase.set(UpdaterPhase::Reorganizing);
        let _lock = self.update_lock.lock();

        let local_last = self.dao.last_block()?.ok_or(SyncError::NoLocalBlocks)?;
        if hash_block(&local_last) != compared_tip {
            debug!("local chain changed since comparison");
            phase.set(UpdaterPhase::Aborted);
            return Ok(NodeInteractionResult::Neutral);
        }

        let min_blocks = u32::try_from(local_last.height.blocks_above(common)).unwrap_or(u32::MAX);
        let request = ChainRequest::new(common, min_blocks, self.config.max_transactions);
        let peer_chain = match self.connector.chain_after(peer, &request) {
            Ok(blocks) => blocks,
            Err(e) => {
                debug!(error = %e, "chain request failed");
                phase.set(UpdaterPhase::Aborted);
                return Ok(NodeInteractionResult::Failure);
            }
        };

        let parent = self
            .dao
            .find_by_height(common)?
            .ok_or(SyncError::MissingLocalBlock(common))?;
        let mut snapshot = self.state().snapshot();
        let rollback = if chains_consistent {
            Rollback::default()
        } else {
            self.rollback_engine().unwind_to(&mut snapshot, common)?
        };

        let result = self.update_context(snapshot, parent, peer_chain, rollback.score).update()?;
        if result.outcome.is_score_inferior() {
            phase.set(UpdaterPhase::Aborted);
            return Err(SyncError::FatalPeer(ComparisonResult::RemoteLiedAboutChainScore));
        }
        match result.accepted {
            Some(accepted) => {
                self.commit(common, accepted, rollback, result.outcome)?;
                phase.set(UpdaterPhase::Committed);
                Ok(NodeInteractionResult::Success)
            }
            None => {
                phase.set(UpdaterPhase::Aborted);
                Ok(NodeInteractionResult::from_validation(result.outcome.validation_result))
            }
        }
    }

    /// Pull the unconfirmed transactions of a peer whose chain matches ours.
    fn pull_unconfirmed(&self, peer: &Peer) -> NodeInteractionResult {
        let known: Vec<TxHash> = self.unconfirmed.all().iter().map(hash_transaction).collect();
        let transactions = match self.connector.unconfirmed_transactions(peer, &known) {
            Ok(transactions) => transactions,
            Err(e) => {
                debug!(error = %e, "unconfirmed transaction request failed");
                return NodeInteractionResult::Failure;
            }
        };
        let added = transactions
            .into_iter()
            .filter(|tx| self.unconfirmed.add_new(tx.clone()).is_success())
            .count();
        self.stats.add(stats::TRANSACTIONS_PULLED, added as u64);
        debug!(added, "pulled unconfirmed transactions");
        NodeInteractionResult::Neutral
    }

    /// Try to attach a single block pushed to us.
    ///
    /// Returns `Neutral` for blocks we already have, blocks whose parent we
    /// do not know and blocks that would require rolling back further than
    /// the rewrite limit.
    pub fn update_block(&self, block: Block) -> Result<ValidationResult, SyncError> {
        let hash = hash_block(&block);
        let span = block_update_span(&hash, block.height);
        let _enter = span.enter();

        let _lock = self.update_lock.lock();
        let phase = PhaseGuard::enter(&self.phase, UpdaterPhase::Reorganizing);
        if self.dao.contains(&hash)? {
            debug!("block already known");
            return Ok(ValidationResult::Neutral);
        }
        let Some(parent) = self.dao.find_by_hash(&block.previous_block_hash)? else {
            debug!("parent unknown");
            return Ok(ValidationResult::Neutral);
        };

        let common = parent.height;
        let tip = self.dao.chain_height()?.ok_or(SyncError::NoLocalBlocks)?;
        let mut snapshot = self.state().snapshot();
        let rollback = if tip > common {
            if tip.blocks_above(common) > self.config.max_blocks_to_rewrite {
                debug!(%tip, %common, "sibling too deep to rewrite");
                phase.set(UpdaterPhase::Aborted);
                return Ok(ValidationResult::Neutral);
            }
            self.rollback_engine().unwind_to(&mut snapshot, common)?
        } else {
            Rollback::default()
        };

        let result = self
            .update_context(snapshot, parent, vec![block], rollback.score)
            .update()?;
        match result.accepted {
            Some(accepted) => {
                self.commit(common, accepted, rollback, result.outcome)?;
                phase.set(UpdaterPhase::Committed);
            }
            None => phase.set(UpdaterPhase::Aborted),
        }
        Ok(result.outcome.validation_result)
    }

    fn rollback_engine(&self) -> RollbackEngine<'_> {
        RollbackEngine::new(
            self.dao.as_ref(),
            self.executor,
            self.scorer.as_ref(),
            self.config.max_blocks_to_rewrite,
        )
    }

    fn update_context(
        &self,
        snapshot: StateSnapshot,
        parent: Block,
        peer_chain: Vec<Block>,
        our_score: ChainScore,
    ) -> BlockChainUpdateContext<'_> {
        BlockChainUpdateContext::new(
            self.dao.as_ref(),
            self.validator.as_ref(),
            self.scorer.as_ref(),
            self.config.difficulty_window,
            snapshot,
            parent,
            peer_chain,
            our_score,
        )
    }

    /// Make `accepted` the local chain above `common`. Must be called with
    /// the update lock held.
    fn commit(
        &self,
        common: BlockHeight,
        accepted: AcceptedChain,
        rollback: Rollback,
        outcome: UpdateOutcome,
    ) -> Result<(), SyncError> {
        let AcceptedChain { state, blocks } = accepted;

        self.dao.delete_blocks_after(common)?;
        if let Err(e) = blocks.iter().try_for_each(|block| self.dao.save(block)) {
            self.restore(common, &rollback.blocks);
            return Err(e.into());
        }
        for block in &blocks {
            self.unconfirmed.remove_all(block);
        }

        let confirmed: HashSet<TxHash> = blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .map(hash_transaction)
            .collect();
        let requeued = rollback
            .reverted_transactions
            .into_iter()
            .filter(|tx| !confirmed.contains(&hash_transaction(tx)))
            .filter(|tx| self.unconfirmed.add_existing(tx.clone()).is_success())
            .count();

        *self.state.write() = Arc::new(state);
        let score = {
            let mut score = self.score.write();
            *score = score.saturating_sub(outcome.our_score) + outcome.peer_score;
            *score
        };

        let tip: Option<BlockHash> = blocks.last().map(hash_block);
        info!(
            %common,
            committed = blocks.len(),
            reverted = rollback.blocks_reverted,
            requeued,
            %score,
            tip = ?tip,
            "committed chain"
        );
        self.stats.add(stats::BLOCKS_COMMITTED, blocks.len() as u64);
        self.stats.add(stats::BLOCKS_REVERTED, rollback.blocks_reverted);
        self.stats.add(stats::TRANSACTIONS_REQUEUED, requeued as u64);
        self.events.emit(&ChainEvent::BlocksCommitted { blocks, score });
        Ok(())
    }

    /// Put the unwound local blocks back above `common` after a failed
    /// commit, so storage matches the canonical state again.
    fn restore(&self, common: BlockHeight, local: &[Block]) {
        let restored = self
            .dao
            .delete_blocks_after(common)
            .and_then(|()| local.iter().try_for_each(|block| self.dao.save(block)));
        match restored {
            Ok(()) => warn!(%common, blocks = local.len(), "commit failed, local chain restored"),
            Err(e) => error!(%common, error = %e, "commit failed and local chain could not be restored"),
        }
    }
}
