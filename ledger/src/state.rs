//! Canonical ledger state and the working snapshots taken from it.
//!
//! `LedgerState` is cheap to clone: every cache is copy-on-write. A
//! reorganization takes a [`StateSnapshot`], mutates it speculatively and
//! either turns it back into a `LedgerState` that replaces the canonical one,
//! or drops it.

use nis_crypto::blake2b_256_multi;
use nis_types::{Address, Amount, BlockHeight, TxHash};

use crate::account::AccountStateCache;
use crate::hash_cache::HashCache;
use crate::importance::ImportanceFacade;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    accounts: AccountStateCache,
    importances: ImportanceFacade,
    hashes: HashCache,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after the nemesis block: only the initial allocation.
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        Self {
            accounts: AccountStateCache::with_balances(balances),
            ..Self::default()
        }
    }

    pub fn accounts(&self) -> &AccountStateCache {
        &self.accounts
    }

    pub fn importances(&self) -> &ImportanceFacade {
        &self.importances
    }

    pub fn hashes(&self) -> &HashCache {
        &self.hashes
    }

    /// Take an isolated working copy. O(1); caches are copied on first write.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state: self.clone(),
        }
    }

    /// Deterministic digest of balances, harvest counts and known hashes.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut accounts: Vec<_> = self.accounts.iter().collect();
        accounts.sort_by(|a, b| a.0.cmp(b.0));
        let hashes = self.hashes_sorted();

        let mut buf = Vec::with_capacity(accounts.len() * 64 + hashes.len() * 40);
        for (address, state) in accounts {
            buf.extend_from_slice(address.as_str().as_bytes());
            buf.extend_from_slice(&state.balance.raw().to_le_bytes());
            buf.extend_from_slice(&state.harvested_blocks.to_le_bytes());
        }
        for (hash, height) in hashes {
            buf.extend_from_slice(hash.as_bytes());
            buf.extend_from_slice(&height.raw().to_le_bytes());
        }
        blake2b_256_multi(&[b"ledger-state".as_slice(), buf.as_slice()])
    }

    fn hashes_sorted(&self) -> Vec<(TxHash, BlockHeight)> {
        let mut all: Vec<_> = self
            .hashes
            .iter()
            .map(|(hash, height)| (*hash, *height))
            .collect();
        all.sort();
        all
    }
}

/// A working copy of [`LedgerState`] owned by exactly one update.
///
/// Not `Clone`: a snapshot is either promoted with [`StateSnapshot::into_state`]
/// or dropped.
#[derive(Debug)]
pub struct StateSnapshot {
    state: LedgerState,
}

impl StateSnapshot {
    pub fn accounts(&self) -> &AccountStateCache {
        &self.state.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountStateCache {
        &mut self.state.accounts
    }

    pub fn importances(&self) -> &ImportanceFacade {
        &self.state.importances
    }

    pub fn importances_mut(&mut self) -> &mut ImportanceFacade {
        &mut self.state.importances
    }

    pub fn hashes(&self) -> &HashCache {
        &self.state.hashes
    }

    pub fn hashes_mut(&mut self) -> &mut HashCache {
        &mut self.state.hashes
    }

    /// Activate the importance calculation for `height`, computing it from
    /// the snapshot's current balances if needed.
    pub fn recalculate_importances(&mut self, height: BlockHeight) {
        let LedgerState {
            accounts,
            importances,
            ..
        } = &mut self.state;
        importances.recalculate(height, accounts);
    }

    /// Finish the snapshot, yielding the state that replaces the canonical one.
    pub fn into_state(self) -> LedgerState {
        self.state
    }
}
