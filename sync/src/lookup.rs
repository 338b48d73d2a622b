//! Uniform read access to a chain, local or remote.
//!
//! The comparer is written against [`BlockLookup`] so the local chain and a
//! peer's chain are examined the same way.

use nis_network::{Peer, SyncConnector};
use nis_store::BlockDao;
use nis_types::{Block, BlockHeight, ChainScore, HashChain};

use crate::SyncError;

pub trait BlockLookup {
    fn last_block(&self) -> Result<Option<Block>, SyncError>;

    fn block_at(&self, height: BlockHeight) -> Result<Option<Block>, SyncError>;

    /// Hashes starting at `height`, ascending. Local stores return at most
    /// `limit`; a remote peer decides for itself how many to send.
    fn hashes_from(&self, height: BlockHeight, limit: usize) -> Result<HashChain, SyncError>;

    /// The chain's score, if this lookup knows it.
    fn chain_score(&self) -> Result<Option<ChainScore>, SyncError> {
        Ok(None)
    }
}

/// Lookup over locally persisted blocks.
pub struct LocalBlockLookup<'a> {
    dao: &'a dyn BlockDao,
    score: Option<ChainScore>,
}

impl<'a> LocalBlockLookup<'a> {
    pub fn new(dao: &'a dyn BlockDao) -> Self {
        Self { dao, score: None }
    }

    pub fn with_score(mut self, score: ChainScore) -> Self {
        self.score = Some(score);
        self
    }
}

impl BlockLookup for LocalBlockLookup<'_> {
    fn last_block(&self) -> Result<Option<Block>, SyncError> {
        Ok(self.dao.last_block()?)
    }

    fn block_at(&self, height: BlockHeight) -> Result<Option<Block>, SyncError> {
        Ok(self.dao.find_by_height(height)?)
    }

    fn hashes_from(&self, height: BlockHeight, limit: usize) -> Result<HashChain, SyncError> {
        Ok(self.dao.hashes_from(height, limit)?)
    }

    fn chain_score(&self) -> Result<Option<ChainScore>, SyncError> {
        Ok(self.score)
    }
}

/// Lookup that asks a remote peer through a [`SyncConnector`].
pub struct RemoteBlockLookup<'a> {
    connector: &'a dyn SyncConnector,
    peer: &'a Peer,
}

impl<'a> RemoteBlockLookup<'a> {
    pub fn new(connector: &'a dyn SyncConnector, peer: &'a Peer) -> Self {
        Self { connector, peer }
    }
}

impl BlockLookup for RemoteBlockLookup<'_> {
    fn last_block(&self) -> Result<Option<Block>, SyncError> {
        Ok(self.connector.last_block(self.peer)?)
    }

    fn block_at(&self, height: BlockHeight) -> Result<Option<Block>, SyncError> {
        Ok(self.connector.block_at(self.peer, height)?)
    }

    fn hashes_from(&self, height: BlockHeight, _limit: usize) -> Result<HashChain, SyncError> {
        Ok(self.connector.hashes_from(self.peer, height)?)
    }

    fn chain_score(&self) -> Result<Option<ChainScore>, SyncError> {
        Ok(Some(self.connector.chain_score(self.peer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nis_nullables::{NullBlockDao, NullChainBuilder, NullPeerChain, NullSyncConnector};

    #[test]
    fn local_lookup_reads_storage() {
        let chain = NullChainBuilder::new().chain(6);
        let dao = NullBlockDao::with_chain(&chain).unwrap();
        let lookup = LocalBlockLookup::new(&dao);

        assert_eq!(lookup.last_block().unwrap(), chain.last().cloned());
        assert_eq!(lookup.hashes_from(BlockHeight::new(2), 3).unwrap().len(), 3);
        assert_eq!(lookup.chain_score().unwrap(), None);
        let scored = LocalBlockLookup::new(&dao).with_score(ChainScore::new(5));
        assert_eq!(scored.chain_score().unwrap(), Some(ChainScore::new(5)));
    }

    #[test]
    fn remote_lookup_surfaces_transport_errors() {
        let chain = NullChainBuilder::new().chain(4);
        let connector = NullSyncConnector::new();
        let peer = Peer::new("p", "10.0.0.3:7890");
        connector.add_peer(&peer, NullPeerChain::new(chain).failing_on("chain_score"));
        let lookup = RemoteBlockLookup::new(&connector, &peer);

        assert!(lookup.block_at(BlockHeight::new(2)).unwrap().is_some());
        assert!(matches!(lookup.chain_score(), Err(SyncError::Network(_))));
    }
}
