//! Account state cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use nis_types::{Address, Amount};

use crate::error::LedgerError;

/// Ledger-relevant state of a single account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: Amount,
    /// Number of blocks this account has harvested on the current chain.
    pub harvested_blocks: u64,
}

impl AccountState {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Balances and harvest counts keyed by address.
///
/// The map sits behind an `Arc` so cloning the cache is O(1); the first
/// mutation after a clone copies the map (`Arc::make_mut`). Accounts that
/// return to the default state are dropped so an execute followed by an undo
/// leaves the cache equal to what it was before.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountStateCache {
    accounts: Arc<HashMap<Address, AccountState>>,
}

impl AccountStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from initial balances, e.g. the nemesis allocation.
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        let accounts = balances
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(address, balance)| {
                (
                    address,
                    AccountState {
                        balance,
                        harvested_blocks: 0,
                    },
                )
            })
            .collect();
        Self {
            accounts: Arc::new(accounts),
        }
    }

    pub fn get(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or(Amount::ZERO)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of all balances, saturating.
    pub fn total_balance(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::ZERO, |acc, a| acc.checked_add(a.balance).unwrap_or(acc))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }

    /// Whether `self` and `other` share the same underlying map.
    pub fn shares_storage_with(&self, other: &AccountStateCache) -> bool {
        Arc::ptr_eq(&self.accounts, &other.accounts)
    }

    pub fn credit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.update(address, |state| {
            state.balance = state
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(address.clone()))?;
            Ok(())
        })
    }

    pub fn debit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.update(address, |state| {
            state.balance = state.balance.checked_sub(amount).ok_or_else(|| {
                LedgerError::InsufficientBalance {
                    account: address.clone(),
                    needed: amount,
                    available: state.balance,
                }
            })?;
            Ok(())
        })
    }

    pub fn increment_harvested(&mut self, address: &Address) -> Result<(), LedgerError> {
        self.update(address, |state| {
            state.harvested_blocks += 1;
            Ok(())
        })
    }

    pub fn decrement_harvested(&mut self, address: &Address) -> Result<(), LedgerError> {
        self.update(address, |state| {
            state.harvested_blocks = state
                .harvested_blocks
                .checked_sub(1)
                .ok_or_else(|| LedgerError::HarvestUnderflow(address.clone()))?;
            Ok(())
        })
    }

    /// Apply `f` to the state of `address`. Nothing is written if `f` fails.
    fn update(
        &mut self,
        address: &Address,
        f: impl FnOnce(&mut AccountState) -> Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        let mut state = self.get(address);
        f(&mut state)?;
        let accounts = Arc::make_mut(&mut self.accounts);
        if state.is_default() {
            accounts.remove(address);
        } else {
            accounts.insert(address.clone(), state);
        }
        Ok(())
    }
}
