//! Block difficulty.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Difficulty of a block, clamped to `[MIN, MAX]` on construction.
///
/// Difficulty is never signed or hashed as part of a block: every node
/// re-derives it from the timestamps and difficulties of preceding blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockDifficulty(u64);

impl BlockDifficulty {
    pub const INITIAL: Self = Self(100_000_000_000_000);
    pub const MIN: Self = Self(Self::INITIAL.0 / 10);
    pub const MAX: Self = Self(Self::INITIAL.0 * 10);

    pub fn new(raw: u64) -> Self {
        Self(raw.clamp(Self::MIN.0, Self::MAX.0))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_clamped(&self) -> bool {
        *self == Self::MIN || *self == Self::MAX
    }
}

impl Default for BlockDifficulty {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for BlockDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
