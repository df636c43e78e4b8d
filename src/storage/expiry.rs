//! Active Expiry
//!
//! Lazy expiry (checking on access) never reclaims a key that nobody reads
//! again. The server therefore runs [`active_expire_cycle`] from a
//! recurring reactor time event: every `interval_ms` it samples a handful
//! of keys with a deadline in each database and evicts the dead ones.
//!
//! Sampling is random with replacement, so a single cycle is cheap and
//! bounded regardless of keyspace size; repeated cycles converge on
//! reclaiming every expired key.

use crate::clock::now_ms;
use crate::storage::db::Db;
use tracing::{debug, trace};

/// Configuration for the active expiry cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Keys sampled per database per cycle (default: 10)
    pub samples_per_db: usize,

    /// Delay between cycles in milliseconds (default: 100)
    pub interval_ms: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            samples_per_db: 10,
            interval_ms: 100,
        }
    }
}

/// Runs one sampling pass over every database.
///
/// Returns the total number of keys evicted.
pub fn active_expire_cycle(dbs: &mut [Db], config: &ExpiryConfig) -> usize {
    let now = now_ms();
    let mut total = 0;

    for db in dbs.iter_mut() {
        if db.expires_len() == 0 {
            continue;
        }

        let evicted = db.active_expire_cycle(config.samples_per_db, now);
        if evicted > 0 {
            debug!(
                db = db.id(),
                evicted,
                keys_remaining = db.len(),
                "Expired keys cleaned up"
            );
        }
        total += evicted;
    }

    trace!(evicted = total, "Active expiry cycle finished");
    total
}
