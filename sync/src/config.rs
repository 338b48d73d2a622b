//! Synchronization configuration with TOML file support.

use std::path::Path;

use nis_ledger::{BlockExecutor, DefaultChainValidator, DIFFICULTY_WINDOW};
use nis_types::NetworkId;
use nis_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::comparison::{
    ComparisonContext, DEFAULT_MAX_BLOCKS_TO_ANALYZE, DEFAULT_MAX_BLOCKS_TO_REWRITE,
};
use crate::SyncError;

/// Configuration for the synchronization engine.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Which network the node belongs to.
    #[serde(default)]
    pub network: NetworkId,

    /// Maximum number of hashes accepted from a peer in one comparison.
    #[serde(default = "default_max_blocks_to_analyze")]
    pub max_blocks_to_analyze: usize,

    /// Maximum number of local blocks a reorganization may roll back.
    #[serde(default = "default_max_blocks_to_rewrite")]
    pub max_blocks_to_rewrite: u64,

    /// Transaction budget for one chain request.
    #[serde(default = "default_max_transactions")]
    pub max_transactions: u32,

    /// Number of preceding blocks a difficulty is derived from.
    #[serde(default = "default_difficulty_window")]
    pub difficulty_window: usize,

    #[serde(default = "default_max_transactions_per_block")]
    pub max_transactions_per_block: usize,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. "info" or "info,nis_sync=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_blocks_to_analyze() -> usize {
    DEFAULT_MAX_BLOCKS_TO_ANALYZE
}

fn default_max_blocks_to_rewrite() -> u64 {
    DEFAULT_MAX_BLOCKS_TO_REWRITE
}

fn default_max_transactions() -> u32 {
    10_000
}

fn default_difficulty_window() -> usize {
    DIFFICULTY_WINDOW
}

fn default_max_transactions_per_block() -> usize {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SyncConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_blocks_to_analyze == 0 {
            return Err(SyncError::Config("max_blocks_to_analyze must be positive".into()));
        }
        if self.max_blocks_to_rewrite == 0 {
            return Err(SyncError::Config("max_blocks_to_rewrite must be positive".into()));
        }
        if self.difficulty_window < 2 {
            return Err(SyncError::Config("difficulty_window must be at least 2".into()));
        }
        Ok(())
    }

    pub fn comparison_context(&self) -> ComparisonContext {
        ComparisonContext::new(self.max_blocks_to_analyze, self.max_blocks_to_rewrite)
    }

    pub fn executor(&self) -> BlockExecutor {
        BlockExecutor::new(self.network)
    }

    /// Install the global subscriber with this configuration's format and
    /// level. `RUST_LOG` still takes precedence.
    pub fn init_logging(&self) -> Result<(), SyncError> {
        nis_utils::try_init_logging(self.log_format, &self.log_level)
            .map_err(|e| SyncError::Config(e.to_string()))
    }

    /// The default validator, sized by this configuration.
    pub fn validator(&self) -> DefaultChainValidator {
        DefaultChainValidator::new(self.executor())
            .with_max_chain_size(self.max_blocks_to_analyze)
            .with_max_transactions_per_block(self.max_transactions_per_block)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::default(),
            max_blocks_to_analyze: default_max_blocks_to_analyze(),
            max_blocks_to_rewrite: default_max_blocks_to_rewrite(),
            max_transactions: default_max_transactions(),
            difficulty_window: default_difficulty_window(),
            max_transactions_per_block: default_max_transactions_per_block(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
