//! Ordered runs of block hashes exchanged during chain comparison.

use serde::{Deserialize, Serialize};

use crate::hash::BlockHash;

/// Consecutive block hashes, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChain(Vec<BlockHash>);

impl HashChain {
    pub fn new(hashes: Vec<BlockHash>) -> Self {
        Self(hashes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BlockHash> {
        self.0.get(index)
    }

    pub fn first(&self) -> Option<&BlockHash> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&BlockHash> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockHash> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[BlockHash] {
        &self.0
    }

    /// Length of the prefix shared with `other`.
    pub fn common_prefix_len(&self, other: &HashChain) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Whether `self` begins with every hash of `other`.
    pub fn starts_with(&self, other: &HashChain) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl From<Vec<BlockHash>> for HashChain {
    fn from(hashes: Vec<BlockHash>) -> Self {
        Self(hashes)
    }
}

impl IntoIterator for HashChain {
    type Item = BlockHash;
    type IntoIter = std::vec::IntoIter<BlockHash>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(bytes: &[u8]) -> HashChain {
        bytes.iter().map(|b| BlockHash::new([*b; 32])).collect::<Vec<_>>().into()
    }

    #[test]
    fn common_prefix_stops_at_first_difference() {
        assert_eq!(chain(&[1, 2, 3, 4]).common_prefix_len(&chain(&[1, 2, 9, 4])), 2);
    }

    #[test]
    fn common_prefix_bounded_by_shorter_chain() {
        assert_eq!(chain(&[1, 2]).common_prefix_len(&chain(&[1, 2, 3])), 2);
        assert_eq!(chain(&[]).common_prefix_len(&chain(&[1])), 0);
    }

    #[test]
    fn starts_with_detects_prefix() {
        assert!(chain(&[1, 2, 3]).starts_with(&chain(&[1, 2])));
        assert!(!chain(&[1, 2]).starts_with(&chain(&[1, 2, 3])));
    }
}
