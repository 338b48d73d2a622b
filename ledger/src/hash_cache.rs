//! Cache of executed transaction hashes, used to reject replays.

use std::collections::HashMap;
use std::sync::Arc;

use nis_types::{BlockHeight, TxHash};

use crate::error::LedgerError;

/// Maps each executed transaction hash to the height of its block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashCache {
    hashes: Arc<HashMap<TxHash, BlockHeight>>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.hashes.contains_key(hash)
    }

    pub fn height_of(&self, hash: &TxHash) -> Option<BlockHeight> {
        self.hashes.get(hash).copied()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TxHash, &BlockHeight)> {
        self.hashes.iter()
    }

    pub fn put(&mut self, hash: TxHash, height: BlockHeight) -> Result<(), LedgerError> {
        if self.contains(&hash) {
            return Err(LedgerError::DuplicateTransaction(hash));
        }
        Arc::make_mut(&mut self.hashes).insert(hash, height);
        Ok(())
    }

    pub fn remove(&mut self, hash: &TxHash) -> Result<(), LedgerError> {
        if !self.contains(hash) {
            return Err(LedgerError::UnknownTransaction(*hash));
        }
        Arc::make_mut(&mut self.hashes).remove(hash);
        Ok(())
    }

    /// Forget hashes recorded below `height`. Returns how many were removed.
    pub fn prune_below(&mut self, height: BlockHeight) -> usize {
        let before = self.hashes.len();
        if self.hashes.values().any(|h| *h < height) {
            Arc::make_mut(&mut self.hashes).retain(|_, h| *h >= height);
        }
        before - self.hashes.len()
    }
}
