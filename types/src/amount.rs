//! Currency amounts.
//!
//! Amounts are fixed-point integers in micro units to avoid floating-point
//! errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of micro units in one whole coin.
pub const MICRO_PER_COIN: u64 = 1_000_000;

/// An amount of the native currency, in micro units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(micro: u64) -> Self {
        Self(micro)
    }

    pub fn from_coins(coins: u64) -> Self {
        Self(coins * MICRO_PER_COIN)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / MICRO_PER_COIN,
            self.0 % MICRO_PER_COIN
        )
    }
}
