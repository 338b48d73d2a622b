use nis_types::BlockHeight;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `save` was asked to store a block that does not sit directly above
    /// the current last block.
    #[error("block at height {expected} expected, got {actual}")]
    NonContiguous {
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}
