//! Block context handed to the block-end entry point.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Height, chain time and opaque data hash of the block being finalized.
///
/// The data hash is only used as tie-break entropy for execution priority;
/// it never influences prices or custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub data_hash: Vec<u8>,
}

impl BlockContext {
    #[must_use]
    pub fn new(height: u64, time: DateTime<Utc>, data_hash: impl Into<Vec<u8>>) -> Self {
        Self {
            height,
            time,
            data_hash: data_hash.into(),
        }
    }

    /// Calendar day of the block time (days since 0001-01-01, UTC).
    #[must_use]
    pub fn day(&self) -> i32 {
        self.time.num_days_from_ce()
    }
}
