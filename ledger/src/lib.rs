//! Ledger state for the NIS node.
//!
//! Account balances, importances and the transaction hash cache live in
//! copy-on-write caches bundled into a [`LedgerState`]. Blocks are applied to
//! and reverted from [`StateSnapshot`]s by the [`BlockExecutor`]; candidate
//! chains are checked by a [`ChainValidator`] and weighed by a [`BlockScorer`].

pub mod account;
pub mod error;
pub mod executor;
pub mod hash_cache;
pub mod importance;
pub mod nemesis;
pub mod scorer;
pub mod state;
pub mod validator;

pub use account::{AccountState, AccountStateCache};
pub use error::LedgerError;
pub use executor::BlockExecutor;
pub use hash_cache::HashCache;
pub use importance::{grouped_height, ImportanceFacade};
pub use nemesis::{create_nemesis_block, nemesis_generation_hash, nemesis_state, NemesisConfig};
pub use scorer::{BlockDifficultyScorer, BlockScorer, DefaultBlockScorer, DIFFICULTY_WINDOW};
pub use state::{LedgerState, StateSnapshot};
pub use validator::{ChainValidator, DefaultChainValidator, ValidationResult};
