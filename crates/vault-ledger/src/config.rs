//! Ledger configuration.

/// Configuration for the Ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Re-validate every sealed record before committing it.
    pub verify_records: bool,
    /// Capacity of the record broadcast channel. Slow subscribers that fall
    /// further behind than this observe a lag error.
    pub subscriber_capacity: usize,
    /// Verify the whole log when reopening a store.
    pub verify_on_open: bool,
    /// Records read per store call when replaying the log for verification
    /// or the audit view. Zero is treated as one.
    pub replay_batch: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            verify_records: true,
            subscriber_capacity: 1024,
            verify_on_open: true,
            replay_batch: 512,
        }
    }
}
