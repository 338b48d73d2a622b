//! Deterministic signed chains for tests.
//!
//! Every chain starts from the same nemesis block and is harvested by a small
//! set of seeded, funded accounts. Derived block fields (generation hash and
//! difficulty) are filled in the same way a node derives them, so chains built
//! here can be stored locally or served by a [`crate::NullSyncConnector`].

use nis_crypto::{
    derive_address, generation_hash, hash_block, keypair_from_seed, sign_block, sign_transaction,
};
use nis_ledger::nemesis::equal_allocation;
use nis_ledger::{
    create_nemesis_block, nemesis_state, BlockDifficultyScorer, BlockExecutor, BlockScorer,
    DefaultBlockScorer, LedgerError, LedgerState, NemesisConfig, DIFFICULTY_WINDOW,
};
use nis_types::{
    Address, Amount, Block, BlockDifficulty, BlockHash, ChainScore, KeyPair, NetworkId, PublicKey,
    Signature, Timestamp, Transaction,
};

/// Seconds between consecutive blocks unless a test asks otherwise.
pub const DEFAULT_SPACING_SECS: u64 = 60;

/// Lifetime of transfers built by [`NullChainBuilder::transfer`].
pub const DEFAULT_DEADLINE_SECS: u64 = 3_600;

const ACCOUNT_COUNT: u8 = 4;
const NEMESIS_TIMESTAMP: u64 = 1_000;
const INITIAL_COINS: u64 = 1_000_000;

pub struct NullChainBuilder {
    network: NetworkId,
    keys: Vec<KeyPair>,
    nemesis: Block,
    initial_state: LedgerState,
}

impl Default for NullChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NullChainBuilder {
    /// Test network, four equally funded accounts, nemesis signed by
    /// account 0.
    pub fn new() -> Self {
        let network = NetworkId::Test;
        let keys: Vec<KeyPair> = (1..=ACCOUNT_COUNT)
            .map(|seed| keypair_from_seed(&[seed; 32]))
            .collect();
        let funded: Vec<&KeyPair> = keys.iter().collect();
        let config = NemesisConfig {
            network,
            signer: &keys[0],
            timestamp: Timestamp::new(NEMESIS_TIMESTAMP),
            allocations: equal_allocation(network, &funded, Amount::from_coins(INITIAL_COINS)),
        };
        let nemesis = create_nemesis_block(&config);
        let initial_state = nemesis_state(&config);
        Self {
            network,
            keys,
            nemesis,
            initial_state,
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn account_count(&self) -> usize {
        self.keys.len()
    }

    /// Key pair of account `index`, modulo the account count.
    pub fn keys(&self, index: usize) -> &KeyPair {
        &self.keys[index % self.keys.len()]
    }

    pub fn address(&self, index: usize) -> Address {
        derive_address(self.network, &self.keys(index).public)
    }

    pub fn nemesis(&self) -> &Block {
        &self.nemesis
    }

    /// Ledger state right after the nemesis block.
    pub fn initial_state(&self) -> LedgerState {
        self.initial_state.clone()
    }

    /// Ledger state after executing every block of `chain` past the nemesis
    /// block, the way a node that stored `chain` would hold it.
    pub fn state_after(&self, chain: &[Block]) -> Result<LedgerState, LedgerError> {
        let executor = BlockExecutor::new(self.network);
        let mut snapshot = self.initial_state.snapshot();
        for block in chain.iter().filter(|b| !b.is_nemesis()) {
            snapshot.recalculate_importances(block.height);
            executor.execute(&mut snapshot, block)?;
        }
        Ok(snapshot.into_state())
    }

    /// Blocks at heights `1..=height` (nemesis included), harvested in turn
    /// by every account at [`DEFAULT_SPACING_SECS`].
    pub fn chain(&self, height: u64) -> Vec<Block> {
        let mut blocks = vec![self.nemesis.clone()];
        while (blocks.len() as u64) < height {
            let harvester = blocks.len() % self.keys.len();
            let block = self.next_block(&blocks, harvester, DEFAULT_SPACING_SECS, Vec::new());
            blocks.push(block);
        }
        blocks
    }

    /// `count` new blocks on top of `base`, all harvested by `harvester`.
    /// Only the new blocks are returned.
    pub fn extend(&self, base: &[Block], count: usize, harvester: usize, spacing: u64) -> Vec<Block> {
        let mut working = base.to_vec();
        for _ in 0..count {
            let block = self.next_block(&working, harvester, spacing, Vec::new());
            working.push(block);
        }
        working.split_off(base.len())
    }

    /// The signed child of `base`'s last block. `base` must end with the
    /// parent and contain at least its difficulty window.
    pub fn next_block(
        &self,
        base: &[Block],
        harvester: usize,
        spacing: u64,
        transactions: Vec<Transaction>,
    ) -> Block {
        let parent = base.last().unwrap_or(&self.nemesis);
        let window = &base[base.len().saturating_sub(DIFFICULTY_WINDOW)..];
        let difficulties: Vec<BlockDifficulty> = window.iter().map(|b| b.difficulty).collect();
        let timestamps: Vec<Timestamp> = window.iter().map(|b| b.timestamp).collect();

        let mut block = Block {
            height: parent.height.next(),
            timestamp: parent.timestamp.add_secs(spacing),
            signer: PublicKey([0u8; 32]),
            previous_block_hash: hash_block(parent),
            previous_generation_hash: generation_hash(
                &parent.previous_generation_hash,
                &parent.signer,
            ),
            difficulty: BlockDifficultyScorer.calculate_difficulty(&difficulties, &timestamps),
            transactions,
            signature: Signature::EMPTY,
        };
        sign_block(&mut block, self.keys(harvester));
        block
    }

    /// A signed transfer from account `from` to account `to`.
    pub fn transfer(
        &self,
        from: usize,
        to: usize,
        amount: Amount,
        fee: Amount,
        timestamp: Timestamp,
    ) -> Transaction {
        let mut tx = Transaction {
            timestamp,
            deadline: timestamp.add_secs(DEFAULT_DEADLINE_SECS),
            signer: self.keys(from).public,
            recipient: self.address(to),
            amount,
            fee,
            signature: Signature::EMPTY,
        };
        sign_transaction(&mut tx, self.keys(from));
        tx
    }

    /// Re-sign `block` with account `harvester` after a test tampered with it.
    pub fn resign(&self, block: &mut Block, harvester: usize) {
        sign_block(block, self.keys(harvester));
    }

    /// Sum of the block scores of `chain`, each block scored against its
    /// predecessor. The nemesis block contributes nothing.
    pub fn score_of(chain: &[Block]) -> ChainScore {
        chain
            .windows(2)
            .map(|pair| DefaultBlockScorer.calculate_block_score(&pair[0], &pair[1]))
            .map(ChainScore::from)
            .sum()
    }

    /// Hash of the last block of `chain`, or zero for an empty chain.
    pub fn tip_hash(chain: &[Block]) -> BlockHash {
        chain.last().map(hash_block).unwrap_or(BlockHash::ZERO)
    }
}
