//! Fundamental types for the NIS ledger.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: hashes, block heights, timestamps, difficulties, amounts, chain
//! scores, keys, addresses and the `Block` / `Transaction` entities.

pub mod address;
pub mod amount;
pub mod block;
pub mod difficulty;
pub mod hash;
pub mod hash_chain;
pub mod height;
pub mod keys;
pub mod network;
pub mod score;
pub mod time;
pub mod transaction;

pub use address::Address;
pub use amount::Amount;
pub use block::Block;
pub use difficulty::BlockDifficulty;
pub use hash::{BlockHash, TxHash};
pub use hash_chain::HashChain;
pub use height::BlockHeight;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use score::ChainScore;
pub use time::Timestamp;
pub use transaction::Transaction;
