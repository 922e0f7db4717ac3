//! Counters for rate resolution and cache behaviour.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::converter::RateTier;

/// Conversion metrics.
#[derive(Debug, Default)]
pub struct FxMetrics {
    /// Rates answered by the identity shortcut.
    pub identity: AtomicU64,
    /// Rates answered from the live table (direct, inverse or bridged).
    pub live: AtomicU64,
    /// Rates answered from the fallback table.
    pub fallback: AtomicU64,
    /// Rates that degraded all the way to `1`.
    pub last_resort: AtomicU64,
    /// Times the cache could not provide any table.
    pub cache_errors: AtomicU64,
}

impl FxMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which tier answered a lookup.
    pub fn record_tier(&self, tier: RateTier) {
        let counter = match tier {
            RateTier::Identity => &self.identity,
            RateTier::LiveDirect | RateTier::LiveInverse | RateTier::LiveBridge(_) => &self.live,
            RateTier::FallbackDirect | RateTier::FallbackInverse | RateTier::FallbackBridge(_) => {
                &self.fallback
            }
            RateTier::LastResort => &self.last_resort,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> FxMetricsSnapshot {
        FxMetricsSnapshot {
            identity: self.identity.load(Ordering::Relaxed),
            live: self.live.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            last_resort: self.last_resort.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FxMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FxMetricsSnapshot {
    pub identity: u64,
    pub live: u64,
    pub fallback: u64,
    pub last_resort: u64,
    pub cache_errors: u64,
}

/// Shared metrics handle.
pub type SharedFxMetrics = Arc<FxMetrics>;
