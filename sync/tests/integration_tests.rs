//! End-to-end synchronization scenarios.
//!
//! Each test wires a real updater, validator and scorer to in-memory storage
//! and scripted peers, then checks storage, canonical state, chain score and
//! the transaction pool after one synchronization attempt.

use std::collections::HashSet;
use std::sync::Arc;

use nis_crypto::{hash_block, hash_transaction};
use nis_ledger::{DefaultBlockScorer, ValidationResult};
use nis_network::Peer;
use nis_nullables::{NullBlockDao, NullChainBuilder, NullPeerChain, NullSyncConnector};
use nis_sync::stats;
use nis_sync::{
    BlockChainUpdater, ChainEvent, ComparisonResult, DefaultUnconfirmedTransactions,
    NodeInteractionResult, SyncConfig, SyncError, UnconfirmedTransactions,
};
use nis_types::{Amount, Block, BlockHash, ChainScore, HashChain, Transaction, TxHash};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Node {
    dao: Arc<NullBlockDao>,
    connector: Arc<NullSyncConnector>,
    pool: Arc<DefaultUnconfirmedTransactions>,
    events: Arc<Mutex<Vec<ChainEvent>>>,
    updater: BlockChainUpdater,
}

fn node(local: &[Block]) -> Node {
    node_with(local, SyncConfig::default())
}

fn node_with(local: &[Block], config: SyncConfig) -> Node {
    let builder = NullChainBuilder::new();
    let dao = Arc::new(NullBlockDao::with_chain(local).expect("contiguous chain"));
    let connector = Arc::new(NullSyncConnector::new());
    let pool = Arc::new(DefaultUnconfirmedTransactions::new());
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut updater = BlockChainUpdater::new(
        config.clone(),
        dao.clone(),
        connector.clone(),
        Arc::new(config.validator()),
        Arc::new(DefaultBlockScorer),
        pool.clone(),
        builder.state_after(local).expect("local chain executes"),
    )
    .with_score(NullChainBuilder::score_of(local));
    let sink = Arc::clone(&events);
    updater.subscribe(Box::new(move |event| sink.lock().push(event.clone())));

    Node {
        dao,
        connector,
        pool,
        events,
        updater,
    }
}

impl Node {
    /// A peer serving `blocks` and reporting their true score.
    fn honest_peer(&self, id: &str, blocks: &[Block]) -> Peer {
        let score = NullChainBuilder::score_of(blocks);
        self.peer(id, NullPeerChain::new(blocks.to_vec()).with_score(score))
    }

    fn peer(&self, id: &str, chain: NullPeerChain) -> Peer {
        let peer = Peer::new(id, format!("10.0.0.{}:7890", id.len()));
        self.connector.add_peer(&peer, chain);
        peer
    }

    fn tip(&self) -> BlockHash {
        NullChainBuilder::tip_hash(&self.dao.blocks())
    }
}

fn tx_hashes<'a>(txs: impl IntoIterator<Item = &'a Transaction>) -> HashSet<TxHash> {
    txs.into_iter().map(hash_transaction).collect()
}

/// Local chain ending in a block full of transfers, and a competing peer
/// chain that forks one block earlier, confirms only the first transfer and
/// is harvested faster.
fn forked_chains(builder: &NullChainBuilder) -> (Vec<Block>, Vec<Block>, Vec<Transaction>) {
    let base = builder.chain(9);
    let ts = base[8].timestamp;
    let transfers = vec![
        builder.transfer(1, 2, Amount::from_coins(5), Amount::from_coins(1), ts),
        builder.transfer(2, 1, Amount::from_coins(7), Amount::from_coins(1), ts),
        builder.transfer(1, 0, Amount::from_coins(3), Amount::from_coins(2), ts),
    ];

    let mut local = base.clone();
    local.push(builder.next_block(&base, 3, 60, transfers.clone()));

    let mut remote = base.clone();
    remote.push(builder.next_block(&base, 0, 30, vec![transfers[0].clone()]));
    let b11 = builder.next_block(&remote, 2, 60, Vec::new());
    remote.push(b11);

    (local, remote, transfers)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn synced_peer_leaves_chain_alone_and_shares_transactions() {
    let builder = NullChainBuilder::new();
    let chain = builder.chain(10);
    let node = node(&chain);
    let ts = chain[9].timestamp;
    let pending = builder.transfer(1, 2, Amount::from_coins(1), Amount::from_coins(1), ts);
    let peer = node.peer(
        "synced",
        NullPeerChain::new(chain.clone())
            .with_score(NullChainBuilder::score_of(&chain))
            .with_unconfirmed(vec![pending.clone()]),
    );

    let result = node.updater.update_chain(&peer).unwrap();

    assert_eq!(result, NodeInteractionResult::Neutral);
    assert_eq!(node.dao.write_count(), 0);
    assert_eq!(node.connector.request_count("chain_after"), 0);
    assert_eq!(node.pool.all(), vec![pending]);
    assert!(node.events.lock().is_empty());
}

#[test]
fn simple_extension_appends_blocks() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let remote = builder.chain(12);
    let node = node(&local);
    let peer = node.honest_peer("ahead", &remote);

    let result = node.updater.update_chain(&peer).unwrap();

    assert_eq!(result, NodeInteractionResult::Success);
    assert_eq!(node.dao.blocks(), remote);
    assert_eq!(node.dao.save_count(), 2);
    assert_eq!(node.updater.score(), NullChainBuilder::score_of(&remote));
    assert_eq!(
        node.updater.state().fingerprint(),
        builder.state_after(&remote).unwrap().fingerprint()
    );

    let events = node.events.lock();
    assert_eq!(events.len(), 1);
    let ChainEvent::BlocksCommitted { blocks, score } = &events[0];
    assert_eq!(blocks.len(), 2);
    assert_eq!(*score, node.updater.score());
}

#[test]
fn better_fork_replaces_local_tip() {
    let builder = NullChainBuilder::new();
    let (local, remote, transfers) = forked_chains(&builder);
    let node = node(&local);
    let peer = node.honest_peer("fork", &remote);

    let result = node.updater.update_chain(&peer).unwrap();

    assert_eq!(result, NodeInteractionResult::Success);
    assert_eq!(node.dao.blocks(), remote);
    assert_eq!(node.tip(), hash_block(&remote[10]));
    assert_eq!(node.updater.score(), NullChainBuilder::score_of(&remote));
    assert_eq!(
        node.updater.state().fingerprint(),
        builder.state_after(&remote).unwrap().fingerprint()
    );

    // Displaced transfers wait in the pool; the one the fork confirmed does not.
    assert_eq!(tx_hashes(&node.pool.all()), tx_hashes(&transfers[1..]));
    assert_eq!(node.updater.stats().get(stats::BLOCKS_REVERTED), 1);
    assert_eq!(node.updater.stats().get(stats::TRANSACTIONS_REQUEUED), 2);
}

#[test]
fn reorganization_conserves_transactions() {
    let builder = NullChainBuilder::new();
    let (local, remote, transfers) = forked_chains(&builder);
    let node = node(&local);
    let peer = node.honest_peer("fork", &remote);

    node.updater.update_chain(&peer).unwrap();

    let confirmed = tx_hashes(node.dao.blocks().iter().flat_map(|b| b.transactions.iter()));
    let pooled = tx_hashes(&node.pool.all());
    assert!(confirmed.is_disjoint(&pooled));
    for hash in tx_hashes(&transfers) {
        assert!(confirmed.contains(&hash) || pooled.contains(&hash));
    }
}

#[test]
fn worse_fork_is_not_adopted() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let mut remote = builder.chain(9);
    remote.extend(builder.extend(&remote, 2, 2, 90));
    let node = node(&local);
    let peer = node.peer(
        "slow",
        NullPeerChain::new(remote.clone()).with_score(ChainScore::from(u64::MAX)),
    );

    let result = node.updater.update_chain(&peer).unwrap();

    assert_eq!(result, NodeInteractionResult::Neutral);
    assert_eq!(node.dao.write_count(), 0);
    assert_eq!(node.connector.request_count("chain_after"), 0);
}

#[test]
fn flooding_peer_is_evil() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let remote = builder.chain(12);
    let node = node(&local);
    let flood: Vec<BlockHash> = (0..=1440u32)
        .map(|i| {
            let mut bytes = [0u8; 32];
            bytes[..4].copy_from_slice(&i.to_le_bytes());
            BlockHash::new(bytes)
        })
        .collect();
    let peer = node.peer(
        "flood",
        NullPeerChain::new(remote.clone())
            .with_score(NullChainBuilder::score_of(&remote))
            .with_hashes(HashChain::new(flood)),
    );
    let score_before = node.updater.score();

    let err = node.updater.update_chain(&peer).unwrap_err();

    assert!(matches!(
        err,
        SyncError::FatalPeer(ComparisonResult::RemoteReturnedTooManyHashes)
    ));
    assert!(err.is_fatal_peer());
    assert_eq!(node.dao.write_count(), 0);
    assert_eq!(node.updater.score(), score_before);
    assert_eq!(node.updater.stats().get(stats::EVIL_PEERS), 1);
}

#[test]
fn peer_promising_more_without_new_blocks_lied() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let node = node(&local);
    let peer = node.peer(
        "liar",
        NullPeerChain::new(builder.chain(8)).with_score(ChainScore::from(u64::MAX)),
    );

    let err = node.updater.update_chain(&peer).unwrap_err();
    assert!(matches!(
        err,
        SyncError::FatalPeer(ComparisonResult::RemoteLiedAboutChainScore)
    ));
}

#[test]
fn validated_chain_below_promise_is_a_lie() {
    let builder = NullChainBuilder::new();
    let base = builder.chain(9);
    let mut local = base.clone();
    local.extend(builder.extend(&base, 3, 3, 60));
    // One slightly faster block cannot outscore three local ones.
    let mut remote = base.clone();
    remote.extend(builder.extend(&base, 1, 1, 59));

    let node = node(&local);
    let before = node.updater.state();
    let peer = node.peer(
        "braggart",
        NullPeerChain::new(remote).with_score(ChainScore::from(u64::MAX)),
    );

    let err = node.updater.update_chain(&peer).unwrap_err();

    assert!(matches!(
        err,
        SyncError::FatalPeer(ComparisonResult::RemoteLiedAboutChainScore)
    ));
    assert_eq!(node.dao.write_count(), 0);
    assert!(Arc::ptr_eq(&before, &node.updater.state()));
}

#[test]
fn equal_score_is_neutral() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let mut remote = builder.chain(9);
    remote.extend(builder.extend(&remote, 1, 2, 60));
    let node = node(&local);
    let peer = node.peer(
        "twin",
        NullPeerChain::new(remote).with_score(NullChainBuilder::score_of(&local)),
    );

    assert_eq!(node.updater.update_chain(&peer).unwrap(), NodeInteractionResult::Neutral);
    assert_eq!(node.dao.write_count(), 0);
}

#[test]
fn invalid_chain_leaves_canonical_state_untouched() {
    let builder = NullChainBuilder::new();
    let base = builder.chain(9);
    let mut local = base.clone();
    local.push(builder.next_block(&base, 3, 60, Vec::new()));

    let ts = base[8].timestamp;
    let overspend =
        builder.transfer(1, 2, Amount::from_coins(5_000_000), Amount::from_coins(1), ts);
    let mut remote = base.clone();
    remote.push(builder.next_block(&base, 0, 30, Vec::new()));
    let bad = builder.next_block(&remote, 2, 60, vec![overspend]);
    remote.push(bad);

    let node = node(&local);
    let before = node.updater.state();
    let score_before = node.updater.score();
    let tip_before = node.tip();
    let peer = node.honest_peer("broken", &remote);

    let result = node.updater.update_chain(&peer).unwrap();

    assert_eq!(result, NodeInteractionResult::Failure);
    assert!(Arc::ptr_eq(&before, &node.updater.state()));
    assert_eq!(node.updater.score(), score_before);
    assert_eq!(node.tip(), tip_before);
    assert_eq!(node.dao.write_count(), 0);
    assert!(node.pool.is_empty());
    assert!(node.events.lock().is_empty());
}

#[test]
fn transport_failure_during_fetch_is_plain_failure() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let remote = builder.chain(12);
    let node = node(&local);
    let peer = node.peer(
        "flaky",
        NullPeerChain::new(remote.clone())
            .with_score(NullChainBuilder::score_of(&remote))
            .failing_on("chain_after"),
    );

    assert_eq!(node.updater.update_chain(&peer).unwrap(), NodeInteractionResult::Failure);
    assert_eq!(node.dao.write_count(), 0);
}

#[test]
fn peer_far_behind_is_not_followed() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let config = SyncConfig {
        max_blocks_to_rewrite: 3,
        ..SyncConfig::default()
    };
    let node = node_with(&local, config);
    let peer = node.peer(
        "behind",
        NullPeerChain::new(builder.chain(5)).with_score(ChainScore::from(u64::MAX)),
    );

    assert_eq!(node.updater.update_chain(&peer).unwrap(), NodeInteractionResult::Failure);
    assert_eq!(node.dao.write_count(), 0);
}

#[test]
fn fork_deeper_than_rewrite_limit_is_never_applied() {
    let builder = NullChainBuilder::new();
    let base = builder.chain(5);
    let mut local = base.clone();
    local.extend(builder.extend(&base, 5, 3, 60));
    let mut remote = base.clone();
    remote.extend(builder.extend(&base, 6, 2, 30));

    let config = SyncConfig {
        max_blocks_to_rewrite: 3,
        ..SyncConfig::default()
    };
    let node = node_with(&local, config);
    let peer = node.honest_peer("deep", &remote);

    let err = node.updater.update_chain(&peer).unwrap_err();

    assert!(err.is_fatal_peer());
    assert_eq!(node.dao.write_count(), 0);
    assert_eq!(node.dao.blocks(), local);
}

#[test]
fn pushed_sibling_beyond_rewrite_limit_is_neutral() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let config = SyncConfig {
        max_blocks_to_rewrite: 3,
        ..SyncConfig::default()
    };
    let node = node_with(&local, config);
    let sibling = builder.extend(&local[..5], 1, 2, 30).remove(0);

    assert_eq!(node.updater.update_block(sibling).unwrap(), ValidationResult::Neutral);
    assert_eq!(node.dao.write_count(), 0);
}

#[test]
fn store_failure_is_a_local_error() {
    let builder = NullChainBuilder::new();
    let local = builder.chain(10);
    let remote = builder.chain(12);
    let node = node(&local);
    let peer = node.honest_peer("ahead", &remote);
    let before = node.updater.state();
    node.dao.set_failing(true);

    let err = node.updater.update_chain(&peer).unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert!(!err.is_fatal_peer());
    assert!(Arc::ptr_eq(&before, &node.updater.state()));

    let err = node.updater.update_block(remote[10].clone()).unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
}

#[test]
fn failed_commit_restores_local_chain() {
    let builder = NullChainBuilder::new();
    let (local, remote, _) = forked_chains(&builder);
    let node = node(&local);
    let peer = node.honest_peer("fork", &remote);
    let state_before = node.updater.state();
    let score_before = node.updater.score();
    node.dao.fail_save_after(1);

    let err = node.updater.update_chain(&peer).unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(node.dao.blocks(), local);
    assert!(Arc::ptr_eq(&state_before, &node.updater.state()));
    assert_eq!(
        node.updater.state().fingerprint(),
        builder.state_after(&local).unwrap().fingerprint()
    );
    assert_eq!(node.updater.score(), score_before);
    assert!(node.pool.is_empty());
    assert!(node.events.lock().is_empty());

    // Storage and state still agree, so the next attempt goes through.
    assert_eq!(node.updater.update_chain(&peer).unwrap(), NodeInteractionResult::Success);
    assert_eq!(node.dao.blocks(), remote);
}

#[test]
fn pushed_blocks_extend_then_fork() {
    let builder = NullChainBuilder::new();
    let (local, remote, _) = forked_chains(&builder);
    let node = node(&local[..9]);

    assert_eq!(node.updater.update_block(local[9].clone()).unwrap(), ValidationResult::Success);
    assert_eq!(node.dao.blocks(), local);

    assert_eq!(node.updater.update_block(remote[9].clone()).unwrap(), ValidationResult::Success);
    assert_eq!(node.updater.update_block(remote[10].clone()).unwrap(), ValidationResult::Success);
    assert_eq!(node.dao.blocks(), remote);
    assert_eq!(node.updater.score(), NullChainBuilder::score_of(&remote));
    assert_eq!(node.events.lock().len(), 3);
    assert_eq!(node.pool.len(), 2);
}
