//! Counters describing what synchronization has done so far.

use nis_utils::StatsCounter;

pub const ATTEMPTS: &str = "attempts";
pub const SUCCESSES: &str = "successes";
pub const NEUTRALS: &str = "neutrals";
pub const FAILURES: &str = "failures";
pub const EVIL_PEERS: &str = "evil_peers";
pub const BLOCKS_COMMITTED: &str = "blocks_committed";
pub const BLOCKS_REVERTED: &str = "blocks_reverted";
pub const TRANSACTIONS_REQUEUED: &str = "transactions_requeued";
pub const TRANSACTIONS_PULLED: &str = "transactions_pulled";

const ALL: &[&str] = &[
    ATTEMPTS,
    SUCCESSES,
    NEUTRALS,
    FAILURES,
    EVIL_PEERS,
    BLOCKS_COMMITTED,
    BLOCKS_REVERTED,
    TRANSACTIONS_REQUEUED,
    TRANSACTIONS_PULLED,
];

pub struct SyncStats {
    counters: StatsCounter,
}

impl SyncStats {
    pub fn new() -> Self {
        Self {
            counters: StatsCounter::new(ALL),
        }
    }

    pub fn increment(&self, name: &str) {
        self.counters.increment(name);
    }

    pub fn add(&self, name: &str, value: u64) {
        self.counters.add(name, value);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name)
    }

    pub fn counters(&self) -> &StatsCounter {
        &self.counters
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}
