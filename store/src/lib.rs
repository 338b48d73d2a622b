//! Abstract storage traits for the NIS ledger.
//!
//! Every storage backend (embedded database, in-memory for testing) implements
//! these traits. The synchronization engine depends only on the traits.

pub mod block;
pub mod error;

pub use block::BlockDao;
pub use error::StoreError;
