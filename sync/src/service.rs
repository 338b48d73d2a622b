//! Async entry points over the blocking updater.

use std::sync::Arc;

use nis_ledger::ValidationResult;
use nis_network::Peer;
use nis_types::Block;
use tracing::error;

use crate::result::NodeInteractionResult;
use crate::updater::BlockChainUpdater;
use crate::SyncError;

/// Runs [`BlockChainUpdater`] calls on tokio's blocking pool so async peer
/// handlers can await them.
#[derive(Clone)]
pub struct SyncService {
    updater: Arc<BlockChainUpdater>,
}

impl SyncService {
    pub fn new(updater: Arc<BlockChainUpdater>) -> Self {
        Self { updater }
    }

    pub fn updater(&self) -> &Arc<BlockChainUpdater> {
        &self.updater
    }

    pub async fn update_chain(&self, peer: Peer) -> Result<NodeInteractionResult, SyncError> {
        let updater = Arc::clone(&self.updater);
        tokio::task::spawn_blocking(move || updater.update_chain(&peer))
            .await
            .map_err(task_error)?
    }

    pub async fn update_block(&self, block: Block) -> Result<ValidationResult, SyncError> {
        let updater = Arc::clone(&self.updater);
        tokio::task::spawn_blocking(move || updater.update_block(block))
            .await
            .map_err(task_error)?
    }
}

fn task_error(e: tokio::task::JoinError) -> SyncError {
    error!(error = %e, "sync task did not complete");
    SyncError::Task(e.to_string())
}
