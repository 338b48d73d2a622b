//! Block height.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a block in the chain. The nemesis block sits at height 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Height of the nemesis block.
    pub const ONE: Self = Self(1);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The height directly above this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The height directly below this one, or `None` at or below height 1.
    pub fn prev(&self) -> Option<Self> {
        if self.0 <= 1 {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }

    /// Number of heights strictly above `other` up to and including `self`.
    pub fn blocks_above(&self, other: BlockHeight) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
