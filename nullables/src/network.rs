//! Nullable peer transport: scripted remote chains with fault injection.

use std::collections::HashMap;

use nis_crypto::{hash_block, hash_transaction};
use nis_network::{ChainRequest, NetworkError, Peer, SyncConnector};
use nis_types::{Block, BlockHeight, ChainScore, HashChain, Transaction, TxHash};
use parking_lot::Mutex;

/// Number of hashes a peer returns for one `hashes_from` request.
pub const HASHES_LIMIT: usize = 1440;

/// What one scripted peer serves.
#[derive(Clone, Debug, Default)]
pub struct NullPeerChain {
    blocks: Vec<Block>,
    score: ChainScore,
    hashes: Option<HashChain>,
    last_block: Option<Option<Block>>,
    unconfirmed: Vec<Transaction>,
    failing: Vec<&'static str>,
}

impl NullPeerChain {
    /// A peer serving `blocks`, which start at height 1.
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    /// Score the peer reports, regardless of its blocks.
    pub fn with_score(mut self, score: ChainScore) -> Self {
        self.score = score;
        self
    }

    /// Hashes returned for every `hashes_from` call instead of the real ones.
    pub fn with_hashes(mut self, hashes: HashChain) -> Self {
        self.hashes = Some(hashes);
        self
    }

    /// Last block reported instead of the real tip.
    pub fn with_last_block(mut self, block: Option<Block>) -> Self {
        self.last_block = Some(block);
        self
    }

    pub fn with_unconfirmed(mut self, transactions: Vec<Transaction>) -> Self {
        self.unconfirmed = transactions;
        self
    }

    /// Fail every call to the named request (`"last_block"`, `"hashes_from"`,
    /// `"block_at"`, `"chain_after"`, `"chain_score"` or
    /// `"unconfirmed_transactions"`).
    pub fn failing_on(mut self, request: &'static str) -> Self {
        self.failing.push(request);
        self
    }

    fn index(height: BlockHeight) -> usize {
        (height.raw() as usize).saturating_sub(1)
    }
}

/// In-memory [`SyncConnector`] answering from scripted [`NullPeerChain`]s.
/// Every request is recorded as `(peer id, request name)`.
#[derive(Default)]
pub struct NullSyncConnector {
    peers: Mutex<HashMap<String, NullPeerChain>>,
    requests: Mutex<Vec<(String, &'static str)>>,
}

impl NullSyncConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace what `peer` serves.
    pub fn add_peer(&self, peer: &Peer, chain: NullPeerChain) {
        self.peers.lock().insert(peer.id.clone(), chain);
    }

    pub fn remove_peer(&self, peer: &Peer) {
        self.peers.lock().remove(&peer.id);
    }

    /// All requests so far, oldest first.
    pub fn requests(&self) -> Vec<(String, &'static str)> {
        self.requests.lock().clone()
    }

    /// Number of recorded requests with the given name.
    pub fn request_count(&self, name: &str) -> usize {
        self.requests.lock().iter().filter(|(_, n)| *n == name).count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn with_peer<T>(
        &self,
        peer: &Peer,
        request: &'static str,
        f: impl FnOnce(&NullPeerChain) -> T,
    ) -> Result<T, NetworkError> {
        self.requests.lock().push((peer.id.clone(), request));
        let peers = self.peers.lock();
        let chain = peers
            .get(&peer.id)
            .ok_or_else(|| NetworkError::PeerNotFound(peer.id.clone()))?;
        if chain.failing.contains(&request) {
            return Err(NetworkError::ConnectionFailed(format!(
                "{request} to {peer} failed"
            )));
        }
        Ok(f(chain))
    }
}

impl SyncConnector for NullSyncConnector {
    fn last_block(&self, peer: &Peer) -> Result<Option<Block>, NetworkError> {
        self.with_peer(peer, "last_block", |chain| match &chain.last_block {
            Some(block) => block.clone(),
            None => chain.blocks.last().cloned(),
        })
    }

    fn hashes_from(&self, peer: &Peer, height: BlockHeight) -> Result<HashChain, NetworkError> {
        self.with_peer(peer, "hashes_from", |chain| {
            if let Some(hashes) = &chain.hashes {
                return hashes.clone();
            }
            chain
                .blocks
                .iter()
                .skip(NullPeerChain::index(height))
                .take(HASHES_LIMIT)
                .map(hash_block)
                .collect::<Vec<_>>()
                .into()
        })
    }

    fn block_at(&self, peer: &Peer, height: BlockHeight) -> Result<Option<Block>, NetworkError> {
        self.with_peer(peer, "block_at", |chain| {
            if height.raw() == 0 {
                return None;
            }
            chain.blocks.get(NullPeerChain::index(height)).cloned()
        })
    }

    fn chain_after(&self, peer: &Peer, request: &ChainRequest) -> Result<Vec<Block>, NetworkError> {
        self.with_peer(peer, "chain_after", |chain| {
            let mut blocks = Vec::new();
            let mut transactions = 0usize;
            for block in chain.blocks.iter().skip(request.height().raw() as usize) {
                if blocks.len() >= request.num_blocks() as usize {
                    break;
                }
                let total = transactions + block.transactions.len();
                if blocks.len() >= request.min_blocks() as usize
                    && total > request.max_transactions() as usize
                {
                    break;
                }
                transactions = total;
                blocks.push(block.clone());
            }
            blocks
        })
    }

    fn chain_score(&self, peer: &Peer) -> Result<ChainScore, NetworkError> {
        self.with_peer(peer, "chain_score", |chain| chain.score)
    }

    fn unconfirmed_transactions(
        &self,
        peer: &Peer,
        known: &[TxHash],
    ) -> Result<Vec<Transaction>, NetworkError> {
        self.with_peer(peer, "unconfirmed_transactions", |chain| {
            chain
                .unconfirmed
                .iter()
                .filter(|tx| !known.contains(&hash_transaction(tx)))
                .cloned()
                .collect()
        })
    }
}
