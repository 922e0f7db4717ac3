//! Time utilities and constants for Pocketbook.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Rate cache timing constants.
pub mod constants {
    use super::Duration;

    /// How long a fetched rate table counts as fresh (1 hour).
    pub const fn rate_cache_ttl() -> Duration {
        Duration::from_secs(60 * 60)
    }

    /// Upper bound on a single remote rate fetch (5 seconds).
    pub const fn rate_fetch_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

/// A timestamp with timezone (always UTC for Pocketbook).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Time elapsed since `timestamp`, zero if it lies in the future.
pub fn age_of(timestamp: Timestamp) -> Duration {
    (now() - timestamp).to_std().unwrap_or(Duration::ZERO)
}
