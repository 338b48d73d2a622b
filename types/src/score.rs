//! Cumulative chain score.

use primitive_types::U256;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Additive, totally ordered measure of accumulated chain weight.
///
/// Backed by a 256-bit integer: summing per-block `u64` scores can never
/// overflow in practice. Subtraction saturates at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainScore(U256);

impl ChainScore {
    pub const ZERO: Self = Self(U256([0; 4]));

    pub fn new(raw: u64) -> Self {
        Self(U256::from(raw))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for ChainScore {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

impl Add for ChainScore {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for ChainScore {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for ChainScore {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, s| acc + s)
    }
}

impl fmt::Display for ChainScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
