//! Pool of transactions waiting to be included in a block.

use std::collections::HashSet;

use nis_crypto::{hash_transaction, verify_transaction};
use nis_ledger::ValidationResult;
use nis_types::{Block, Transaction, TxHash};
use parking_lot::RwLock;
use tracing::trace;

/// Unconfirmed transaction pool as seen by the synchronization engine.
pub trait UnconfirmedTransactions: Send + Sync {
    /// Admit a transaction received from the network. Its signature is
    /// checked and duplicates are refused.
    fn add_new(&self, tx: Transaction) -> ValidationResult;

    /// Re-admit a transaction displaced by a reorganization. It was valid
    /// when first confirmed, so only the duplicate check applies.
    fn add_existing(&self, tx: Transaction) -> ValidationResult;

    /// Drop every transaction included in `block`. Returns how many were
    /// removed.
    fn remove_all(&self, block: &Block) -> usize;

    /// All pooled transactions, in admission order.
    fn all(&self) -> Vec<Transaction>;

    fn contains(&self, hash: &TxHash) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Pool {
    transactions: Vec<(TxHash, Transaction)>,
    hashes: HashSet<TxHash>,
}

impl Pool {
    fn insert(&mut self, hash: TxHash, tx: Transaction) -> ValidationResult {
        if !self.hashes.insert(hash) {
            return ValidationResult::FailureHashExists;
        }
        self.transactions.push((hash, tx));
        ValidationResult::Success
    }
}

/// In-memory [`UnconfirmedTransactions`] keyed by transaction hash.
#[derive(Default)]
pub struct DefaultUnconfirmedTransactions {
    pool: RwLock<Pool>,
}

impl DefaultUnconfirmedTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes of all pooled transactions, in admission order.
    pub fn hashes(&self) -> Vec<TxHash> {
        self.pool.read().transactions.iter().map(|(h, _)| *h).collect()
    }
}

impl UnconfirmedTransactions for DefaultUnconfirmedTransactions {
    fn add_new(&self, tx: Transaction) -> ValidationResult {
        if !verify_transaction(&tx) {
            return ValidationResult::FailureTransactionUnverifiable;
        }
        let hash = hash_transaction(&tx);
        let result = self.pool.write().insert(hash, tx);
        trace!(%hash, %result, "add_new");
        result
    }

    fn add_existing(&self, tx: Transaction) -> ValidationResult {
        let hash = hash_transaction(&tx);
        self.pool.write().insert(hash, tx)
    }

    fn remove_all(&self, block: &Block) -> usize {
        let included: HashSet<TxHash> = block.transactions.iter().map(hash_transaction).collect();
        if included.is_empty() {
            return 0;
        }
        let mut pool = self.pool.write();
        let before = pool.transactions.len();
        pool.transactions.retain(|(hash, _)| !included.contains(hash));
        let Pool {
            transactions,
            hashes,
        } = &mut *pool;
        hashes.retain(|hash| !included.contains(hash));
        before - transactions.len()
    }

    fn all(&self) -> Vec<Transaction> {
        self.pool
            .read()
            .transactions
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    fn contains(&self, hash: &TxHash) -> bool {
        self.pool.read().hashes.contains(hash)
    }

    fn len(&self) -> usize {
        self.pool.read().transactions.len()
    }
}
