//! Account importances.
//!
//! Importances decide which accounts may harvest. They are calculated once
//! per grouping of blocks from the balances at the group's first height and
//! stay fixed until the next group begins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use nis_types::{Address, BlockHeight};

use crate::account::AccountStateCache;

/// Number of blocks sharing one importance calculation.
pub const IMPORTANCE_GROUPING: u64 = 359;

/// Fixed-point scale of an importance: all importances sum to roughly this.
pub const IMPORTANCE_SCALE: u64 = 1_000_000_000;

/// Number of past calculations retained so a rollback across a group
/// boundary finds the earlier group's importances again.
const RETAINED_CALCULATIONS: usize = 4;

/// First height of the importance group containing `height`.
pub fn grouped_height(height: BlockHeight) -> BlockHeight {
    let back_in_time = height.raw().saturating_sub(1);
    let grouped = back_in_time / IMPORTANCE_GROUPING * IMPORTANCE_GROUPING;
    BlockHeight::new(grouped.max(1))
}

type Importances = Arc<HashMap<Address, u64>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportanceFacade {
    calculations: Arc<BTreeMap<BlockHeight, Importances>>,
    current: Option<BlockHeight>,
}

impl ImportanceFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouped height of the active calculation, `None` if stale.
    pub fn recalculated_at(&self) -> Option<BlockHeight> {
        self.current
    }

    pub fn importance_of(&self, address: &Address) -> u64 {
        self.current
            .and_then(|at| self.calculations.get(&at))
            .and_then(|importances| importances.get(address).copied())
            .unwrap_or(0)
    }

    /// Make the calculation for the group containing `height` active,
    /// computing it from `accounts` if it is not retained. Each importance is
    /// the account's share of the total balance scaled by [`IMPORTANCE_SCALE`].
    ///
    /// `accounts` must reflect the chain at the group's first height, which
    /// holds when this is called before executing the group's first block.
    pub fn recalculate(&mut self, height: BlockHeight, accounts: &AccountStateCache) {
        let grouped = grouped_height(height);
        if self.current == Some(grouped) {
            return;
        }
        if self.calculations.contains_key(&grouped) {
            self.current = Some(grouped);
            return;
        }

        let total = accounts.total_balance().raw() as u128;
        let importances: HashMap<Address, u64> = if total == 0 {
            HashMap::new()
        } else {
            accounts
                .iter()
                .filter(|(_, state)| !state.balance.is_zero())
                .map(|(address, state)| {
                    let share = state.balance.raw() as u128 * IMPORTANCE_SCALE as u128 / total;
                    (address.clone(), share as u64)
                })
                .collect()
        };

        let calculations = Arc::make_mut(&mut self.calculations);
        calculations.insert(grouped, Arc::new(importances));
        while calculations.len() > RETAINED_CALCULATIONS {
            calculations.pop_first();
        }
        self.current = Some(grouped);
    }

    /// Drop every calculation taken from balances at or above `height`.
    /// Called when the block at `height` is undone.
    pub fn invalidate_from(&mut self, height: BlockHeight) {
        if self.calculations.range(height..).next().is_none() {
            return;
        }
        Arc::make_mut(&mut self.calculations).retain(|at, _| *at < height);
        if matches!(self.current, Some(at) if at >= height) {
            self.current = None;
        }
    }
}
