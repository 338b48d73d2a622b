//! Nemesis block creation: the first block on each network.
//!
//! The nemesis block sits at height 1, has no predecessor
//! (`previous_block_hash` is zero) and carries no transactions. The initial
//! distribution of coins is supplied separately as a list of allocations that
//! seeds the ledger state every node starts from.

use nis_crypto::{derive_address, generation_hash, hash_block, sign_block};
use nis_types::{
    Address, Amount, Block, BlockDifficulty, BlockHash, BlockHeight, KeyPair, NetworkId,
    PublicKey, Signature, Timestamp,
};

use crate::state::LedgerState;

/// Configuration for creating a nemesis block.
pub struct NemesisConfig<'a> {
    pub network: NetworkId,
    /// Key that signs the nemesis block.
    pub signer: &'a KeyPair,
    pub timestamp: Timestamp,
    /// Initial balances.
    pub allocations: Vec<(Address, Amount)>,
}

/// Create and sign the nemesis block.
pub fn create_nemesis_block(config: &NemesisConfig<'_>) -> Block {
    let mut block = Block {
        height: BlockHeight::ONE,
        timestamp: config.timestamp,
        signer: PublicKey([0u8; 32]),
        previous_block_hash: BlockHash::ZERO,
        previous_generation_hash: BlockHash::ZERO,
        difficulty: BlockDifficulty::INITIAL,
        transactions: Vec::new(),
        signature: Signature::EMPTY,
    };
    sign_block(&mut block, config.signer);
    block
}

/// Ledger state immediately after the nemesis block.
pub fn nemesis_state(config: &NemesisConfig<'_>) -> LedgerState {
    LedgerState::with_balances(config.allocations.iter().cloned())
}

/// Hash of the nemesis block for `config`.
pub fn nemesis_hash(config: &NemesisConfig<'_>) -> BlockHash {
    hash_block(&create_nemesis_block(config))
}

/// Generation hash of the nemesis block.
pub fn nemesis_generation_hash(block: &Block) -> BlockHash {
    generation_hash(&BlockHash::ZERO, &block.signer)
}

/// Allocation giving each key in `keys` the same balance.
pub fn equal_allocation(network: NetworkId, keys: &[&KeyPair], each: Amount) -> Vec<(Address, Amount)> {
    keys.iter()
        .map(|k| (derive_address(network, &k.public), each))
        .collect()
}
