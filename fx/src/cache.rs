//! Time-boxed cache around the remote rate table.
//!
//! The cache owns a single slot holding the last successfully fetched table.
//! Reads within the TTL never touch the network. Once the table is stale the
//! next read starts a refresh; every caller arriving while that refresh is
//! outstanding awaits the same fetch. A failed refresh leaves the old table in
//! place and it keeps being served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use pocketbook_common::constants;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::provider::RateSource;
use crate::quote::SharedRateTable;

/// Configuration for the rate table cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// How long a fetched table is served without refreshing.
    pub ttl: Duration,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::rate_cache_ttl(),
            fetch_timeout: constants::rate_fetch_timeout(),
        }
    }
}

type FetchOutcome = Result<SharedRateTable, String>;
type InFlightFetch = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Debug, Default)]
struct Slot {
    table: Option<SharedRateTable>,
    refreshed_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
    stale_serves: AtomicU64,
}

struct CacheInner {
    source: Arc<dyn RateSource>,
    config: RateCacheConfig,
    slot: RwLock<Slot>,
    in_flight: Mutex<Option<InFlightFetch>>,
    counters: CacheCounters,
}

enum Refresh {
    Fresh(SharedRateTable),
    Pending(InFlightFetch),
}

/// Shared handle to the process's rate table cache.
///
/// Cloning is cheap; all clones share one slot.
#[derive(Clone)]
pub struct RateTableCache {
    inner: Arc<CacheInner>,
}

impl RateTableCache {
    /// Create a cache in front of `source`.
    pub fn new(source: Arc<dyn RateSource>, config: RateCacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                config,
                slot: RwLock::new(Slot::default()),
                in_flight: Mutex::new(None),
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Create a cache with the default one hour TTL and five second timeout.
    pub fn with_defaults(source: Arc<dyn RateSource>) -> Self {
        Self::new(source, RateCacheConfig::default())
    }

    pub fn config(&self) -> &RateCacheConfig {
        &self.inner.config
    }

    /// Get the freshest table available, refreshing it if it is stale.
    ///
    /// Fails only when the refresh fails and no table has ever been stored.
    #[instrument(skip(self), fields(source = self.inner.source.name()))]
    pub async fn table(&self) -> FxResult<SharedRateTable> {
        if let Some(table) = self.fresh_table() {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(age_secs = table.age().as_secs(), "Returning cached rates");
            return Ok(table);
        }

        let fetch = match self.join_or_start_refresh() {
            Refresh::Fresh(table) => return Ok(table),
            Refresh::Pending(fetch) => fetch,
        };

        match fetch.await {
            Ok(table) => Ok(table),
            Err(reason) => self.serve_after_failure(reason),
        }
    }

    /// Peek at the cached table without triggering a fetch.
    pub fn cached(&self) -> Option<SharedRateTable> {
        self.inner.slot.read().table.clone()
    }

    /// Time since the cached table was stored, `None` when empty.
    pub fn age(&self) -> Option<Duration> {
        let slot = self.inner.slot.read();
        slot.table.as_ref()?;
        slot.refreshed_at.map(|at| at.elapsed())
    }

    /// Drop the cached table so the next read has to fetch.
    pub fn clear(&self) {
        *self.inner.slot.write() = Slot::default();
        info!("Exchange rates cache cleared");
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            stale_serves: counters.stale_serves.load(Ordering::Relaxed),
            has_table: self.inner.slot.read().table.is_some(),
        }
    }

    fn fresh_table(&self) -> Option<SharedRateTable> {
        let slot = self.inner.slot.read();
        match (&slot.table, slot.refreshed_at) {
            (Some(table), Some(at)) if at.elapsed() < self.inner.config.ttl => Some(table.clone()),
            _ => None,
        }
    }

    fn join_or_start_refresh(&self) -> Refresh {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(fetch) = in_flight.as_ref() {
            debug!("Joining in-flight rate fetch");
            return Refresh::Pending(fetch.clone());
        }

        // A refresh may have landed between the first check and taking the lock.
        if let Some(table) = self.fresh_table() {
            return Refresh::Fresh(table);
        }

        let fetch = Self::spawn_refresh(self.inner.clone());
        *in_flight = Some(fetch.clone());
        Refresh::Pending(fetch)
    }

    /// Run the fetch on its own task so it completes and stores its result
    /// even if every waiting caller goes away.
    fn spawn_refresh(inner: Arc<CacheInner>) -> InFlightFetch {
        inner.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let owner = Arc::downgrade(&inner);
        let handle = tokio::spawn(async move {
            let _release = InFlightRelease(inner.clone());
            inner.fetch_and_store().await
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                if let Some(inner) = owner.upgrade() {
                    inner.counters.failures.fetch_add(1, Ordering::Relaxed);
                }
                error!(error = %e, "Rate fetch task ended abnormally");
                Err(format!("rate fetch task failed: {}", e))
            })
        }
        .boxed()
        .shared()
    }

    fn serve_after_failure(&self, reason: String) -> FxResult<SharedRateTable> {
        if let Some(table) = self.fresh_table() {
            return Ok(table);
        }

        match self.cached() {
            Some(table) => {
                self.inner.counters.stale_serves.fetch_add(1, Ordering::Relaxed);
                warn!(
                    age_secs = table.age().as_secs(),
                    reason = %reason,
                    "Using stale cached rates due to rate source error"
                );
                Ok(table)
            }
            None => Err(FxError::RateSourceUnavailable(reason)),
        }
    }
}

/// Empties the in-flight slot when the fetch task ends, including by panic
/// or cancellation, so the next stale read starts a new fetch.
struct InFlightRelease(Arc<CacheInner>);

impl Drop for InFlightRelease {
    fn drop(&mut self) {
        *self.0.in_flight.lock() = None;
    }
}

impl CacheInner {
    async fn fetch_and_store(&self) -> FetchOutcome {
        let timeout = self.config.fetch_timeout;
        let result = match tokio::time::timeout(timeout, self.source.fetch_table()).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout {
                source_name: self.source.name().to_string(),
                after: timeout,
            }),
        };

        match result {
            Ok(table) => {
                let table = Arc::new(table);
                {
                    let mut slot = self.slot.write();
                    slot.table = Some(table.clone());
                    slot.refreshed_at = Some(Instant::now());
                }
                info!(quotes = table.len(), "Fetched exchange rates");
                Ok(table)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                error!(source = self.source.name(), error = %e, "Failed to fetch exchange rates");
                Err(e.to_string())
            }
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh table.
    pub hits: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Fetches that failed or timed out.
    pub failures: u64,
    /// Reads answered with a stale table after a failed fetch.
    pub stale_serves: u64,
    pub has_table: bool,
}
