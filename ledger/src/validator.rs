//! Chain validation.
//!
//! The validator is the oracle the synchronization engine consults before
//! accepting a candidate chain: it checks every block against its parent and
//! executes it on the supplied snapshot.

use std::collections::HashSet;
use std::fmt;

use nis_crypto::{derive_address, hash_block, hash_transaction, verify_block, verify_transaction};
use nis_types::{Block, Timestamp, TxHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::executor::BlockExecutor;
use crate::state::StateSnapshot;

/// Default maximum number of blocks accepted in one candidate chain.
pub const BLOCKS_LIMIT: usize = 1440;

/// Default maximum number of transactions in a single block.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 120;

/// How far a block or transaction timestamp may lie in the future.
pub const MAX_ALLOWED_SECONDS_AHEAD_OF_TIME: u64 = 60;

/// Outcome of validating a block or chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationResult {
    Success,
    /// Neither valid nor invalid: the input is a duplicate, does not attach
    /// to our chain, or is not better than what we have.
    Neutral,
    FailureUnknown,
    FailureChainInvalid,
    FailureChainScoreInferior,
    FailureChainTooLong,
    FailureBlockUnverifiable,
    FailureBlockNotChained,
    FailureTimestampTooFarInFuture,
    FailureTimestampNotAfterParent,
    FailureTooManyTransactions,
    FailureIneligibleHarvester,
    FailureTransactionUnverifiable,
    FailureTransactionSignerIsHarvester,
    FailurePastDeadline,
    FailureHashExists,
    FailureInsufficientBalance,
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success | Self::Neutral)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&LedgerError> for ValidationResult {
    fn from(err: &LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } | LedgerError::BalanceOverflow(_) => {
                Self::FailureInsufficientBalance
            }
            LedgerError::DuplicateTransaction(_) => Self::FailureHashExists,
            _ => Self::FailureUnknown,
        }
    }
}

/// Validates a candidate chain on top of `parent`, executing each block on
/// `snapshot` as it goes. On any failure the snapshot must be discarded.
pub trait ChainValidator: Send + Sync {
    fn is_chain_valid(
        &self,
        snapshot: &mut StateSnapshot,
        parent: &Block,
        chain: &[Block],
    ) -> ValidationResult;
}

/// Structural, signature, eligibility and balance checks.
///
/// Blocks must arrive with their previous generation hash and difficulty
/// already derived locally; the validator does not touch either.
#[derive(Clone, Debug)]
pub struct DefaultChainValidator {
    executor: BlockExecutor,
    max_chain_size: usize,
    max_transactions_per_block: usize,
}

impl DefaultChainValidator {
    pub fn new(executor: BlockExecutor) -> Self {
        Self {
            executor,
            max_chain_size: BLOCKS_LIMIT,
            max_transactions_per_block: MAX_TRANSACTIONS_PER_BLOCK,
        }
    }

    pub fn with_max_chain_size(mut self, max_chain_size: usize) -> Self {
        self.max_chain_size = max_chain_size;
        self
    }

    pub fn with_max_transactions_per_block(mut self, max: usize) -> Self {
        self.max_transactions_per_block = max;
        self
    }

    fn check_block(
        &self,
        snapshot: &mut StateSnapshot,
        parent: &Block,
        block: &Block,
        now: Timestamp,
        chain_hashes: &mut HashSet<TxHash>,
    ) -> ValidationResult {
        if block.height != parent.height.next() || block.previous_block_hash != hash_block(parent)
        {
            return ValidationResult::FailureBlockNotChained;
        }
        if !verify_block(block) {
            return ValidationResult::FailureBlockUnverifiable;
        }
        if block.timestamp <= parent.timestamp {
            return ValidationResult::FailureTimestampNotAfterParent;
        }
        let limit = now.add_secs(MAX_ALLOWED_SECONDS_AHEAD_OF_TIME);
        if block.timestamp > limit {
            return ValidationResult::FailureTimestampTooFarInFuture;
        }
        if block.transactions.len() > self.max_transactions_per_block {
            return ValidationResult::FailureTooManyTransactions;
        }

        snapshot.recalculate_importances(block.height);
        let harvester = derive_address(self.executor.network(), &block.signer);
        if snapshot.importances().importance_of(&harvester) == 0 {
            return ValidationResult::FailureIneligibleHarvester;
        }

        for tx in &block.transactions {
            if !verify_transaction(tx) {
                return ValidationResult::FailureTransactionUnverifiable;
            }
            if tx.signer == block.signer {
                return ValidationResult::FailureTransactionSignerIsHarvester;
            }
            if tx.timestamp > limit {
                return ValidationResult::FailureTimestampTooFarInFuture;
            }
            if tx.is_expired(block.timestamp) {
                return ValidationResult::FailurePastDeadline;
            }
            let hash = hash_transaction(tx);
            if snapshot.hashes().contains(&hash) || !chain_hashes.insert(hash) {
                return ValidationResult::FailureHashExists;
            }
        }

        match self.executor.execute(snapshot, block) {
            Ok(()) => ValidationResult::Success,
            Err(err) => {
                debug!(height = %block.height, error = %err, "block execution failed");
                ValidationResult::from(&err)
            }
        }
    }
}

impl ChainValidator for DefaultChainValidator {
    fn is_chain_valid(
        &self,
        snapshot: &mut StateSnapshot,
        parent: &Block,
        chain: &[Block],
    ) -> ValidationResult {
        if chain.len() > self.max_chain_size {
            return ValidationResult::FailureChainTooLong;
        }

        let now = Timestamp::now();
        let mut chain_hashes = HashSet::new();
        let mut parent = parent;
        for block in chain {
            let result = self.check_block(snapshot, parent, block, now, &mut chain_hashes);
            if !result.is_success() {
                debug!(height = %block.height, %result, "candidate block rejected");
                return result;
            }
            parent = block;
        }
        ValidationResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LedgerState;
    use nis_crypto::{keypair_from_seed, sign_block, sign_transaction};
    use nis_types::{
        Address, Amount, BlockDifficulty, BlockHash, BlockHeight, KeyPair, NetworkId, PublicKey,
        Signature, Transaction,
    };

    const NET: NetworkId = NetworkId::Test;

    struct Fixture {
        harvester: KeyPair,
        alice: KeyPair,
        parent: Block,
        state: LedgerState,
    }

    fn fixture() -> Fixture {
        let harvester = keypair_from_seed(&[1u8; 32]);
        let alice = keypair_from_seed(&[2u8; 32]);
        let mut parent = Block {
            height: BlockHeight::ONE,
            timestamp: Timestamp::new(0),
            signer: PublicKey([0u8; 32]),
            previous_block_hash: BlockHash::ZERO,
            previous_generation_hash: BlockHash::ZERO,
            difficulty: BlockDifficulty::INITIAL,
            transactions: Vec::new(),
            signature: Signature::EMPTY,
        };
        sign_block(&mut parent, &harvester);
        let state = LedgerState::with_balances([
            (derive_address(NET, &harvester.public), Amount::new(1_000)),
            (derive_address(NET, &alice.public), Amount::new(1_000)),
        ]);
        Fixture {
            harvester,
            alice,
            parent,
            state,
        }
    }

    fn child(parent: &Block, keys: &KeyPair, transactions: Vec<Transaction>) -> Block {
        let mut block = Block {
            height: parent.height.next(),
            timestamp: parent.timestamp.add_secs(60),
            signer: PublicKey([0u8; 32]),
            previous_block_hash: hash_block(parent),
            previous_generation_hash: BlockHash::ZERO,
            difficulty: BlockDifficulty::INITIAL,
            transactions,
            signature: Signature::EMPTY,
        };
        sign_block(&mut block, keys);
        block
    }

    fn transfer(from: &KeyPair, amount: u64) -> Transaction {
        let mut tx = Transaction {
            timestamp: Timestamp::new(30),
            deadline: Timestamp::new(10_000),
            signer: PublicKey([0u8; 32]),
            recipient: Address::new("TBOB"),
            amount: Amount::new(amount),
            fee: Amount::new(1),
            signature: Signature::EMPTY,
        };
        sign_transaction(&mut tx, from);
        tx
    }

    fn validator() -> DefaultChainValidator {
        DefaultChainValidator::new(BlockExecutor::new(NET))
    }

    #[test]
    fn valid_chain_is_executed_on_snapshot() {
        let f = fixture();
        let b2 = child(&f.parent, &f.harvester, vec![transfer(&f.alice, 10)]);
        let b3 = child(&b2, &f.harvester, vec![]);
        let mut snapshot = f.state.snapshot();

        let result = validator().is_chain_valid(&mut snapshot, &f.parent, &[b2, b3]);
        assert_eq!(result, ValidationResult::Success);
        assert_eq!(snapshot.accounts().balance_of(&Address::new("TBOB")), Amount::new(10));
        assert_eq!(f.state.accounts().balance_of(&Address::new("TBOB")), Amount::ZERO);
    }

    #[test]
    fn unlinked_block_is_rejected() {
        let f = fixture();
        let mut b2 = child(&f.parent, &f.harvester, vec![]);
        b2.previous_block_hash = BlockHash::new([9u8; 32]);
        sign_block(&mut b2, &f.harvester);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2]),
            ValidationResult::FailureBlockNotChained
        );
    }

    #[test]
    fn tampered_block_is_unverifiable() {
        let f = fixture();
        let mut b2 = child(&f.parent, &f.harvester, vec![]);
        b2.timestamp = b2.timestamp.add_secs(1);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2]),
            ValidationResult::FailureBlockUnverifiable
        );
    }

    #[test]
    fn harvester_without_balance_is_ineligible() {
        let f = fixture();
        let stranger = keypair_from_seed(&[77u8; 32]);
        let b2 = child(&f.parent, &stranger, vec![]);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2]),
            ValidationResult::FailureIneligibleHarvester
        );
    }

    #[test]
    fn duplicate_transaction_within_chain_is_rejected() {
        let f = fixture();
        let tx = transfer(&f.alice, 1);
        let b2 = child(&f.parent, &f.harvester, vec![tx.clone()]);
        let b3 = child(&b2, &f.harvester, vec![tx]);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2, b3]),
            ValidationResult::FailureHashExists
        );
    }

    #[test]
    fn overspending_is_rejected() {
        let f = fixture();
        let b2 = child(&f.parent, &f.harvester, vec![transfer(&f.alice, 5_000)]);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2]),
            ValidationResult::FailureInsufficientBalance
        );
    }

    #[test]
    fn chain_longer_than_limit_is_rejected() {
        let f = fixture();
        let b2 = child(&f.parent, &f.harvester, vec![]);
        let b3 = child(&b2, &f.harvester, vec![]);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator()
                .with_max_chain_size(1)
                .is_chain_valid(&mut snapshot, &f.parent, &[b2, b3]),
            ValidationResult::FailureChainTooLong
        );
    }

    #[test]
    fn signer_cannot_pay_own_block() {
        let f = fixture();
        let b2 = child(&f.parent, &f.harvester, vec![transfer(&f.harvester, 1)]);
        let mut snapshot = f.state.snapshot();
        assert_eq!(
            validator().is_chain_valid(&mut snapshot, &f.parent, &[b2]),
            ValidationResult::FailureTransactionSignerIsHarvester
        );
    }
}
