//! Currency converter.
//!
//! Rates are resolved by walking a fixed ladder and taking the first tier
//! that produces a usable rate:
//!
//! 1. identity (`from == to`)
//! 2. live direct, live inverse, live bridge
//! 3. fallback direct, fallback inverse, fallback bridge
//! 4. `1.0` as a last resort
//!
//! Nothing on the ladder is an error. A live table that cannot be obtained
//! just means the live tiers produce nothing.

use std::fmt;
use std::sync::Arc;

use pocketbook_common::{Currency, CurrencyPair, Money};
use tracing::{debug, instrument, warn};

use crate::cache::RateTableCache;
use crate::fallback::FallbackRateTable;
use crate::metrics::{FxMetrics, SharedFxMetrics};
use crate::quote::{RateLookup, SharedRateTable};

/// Intermediates tried, in order, when bridging between two currencies.
pub const DEFAULT_INTERMEDIATES: [Currency; 3] = [Currency::Usd, Currency::Geo, Currency::Eur];

/// The ladder step that produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    Identity,
    LiveDirect,
    LiveInverse,
    LiveBridge(Currency),
    FallbackDirect,
    FallbackInverse,
    FallbackBridge(Currency),
    /// No data connected the pair; the rate is a placeholder `1.0`.
    LastResort,
}

impl RateTier {
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            RateTier::LiveDirect | RateTier::LiveInverse | RateTier::LiveBridge(_)
        )
    }

    pub fn is_last_resort(&self) -> bool {
        matches!(self, RateTier::LastResort)
    }
}

impl fmt::Display for RateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateTier::Identity => f.write_str("identity"),
            RateTier::LiveDirect => f.write_str("live-direct"),
            RateTier::LiveInverse => f.write_str("live-inverse"),
            RateTier::LiveBridge(via) => write!(f, "live-bridge-{}", via),
            RateTier::FallbackDirect => f.write_str("fallback-direct"),
            RateTier::FallbackInverse => f.write_str("fallback-inverse"),
            RateTier::FallbackBridge(via) => write!(f, "fallback-bridge-{}", via),
            RateTier::LastResort => f.write_str("last-resort"),
        }
    }
}

/// A rate together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub pair: CurrencyPair,
    pub rate: f64,
    pub tier: RateTier,
}

#[derive(Debug, Clone, Copy)]
enum Layer {
    Live,
    Fallback,
}

impl Layer {
    fn direct(self) -> RateTier {
        match self {
            Layer::Live => RateTier::LiveDirect,
            Layer::Fallback => RateTier::FallbackDirect,
        }
    }

    fn inverse(self) -> RateTier {
        match self {
            Layer::Live => RateTier::LiveInverse,
            Layer::Fallback => RateTier::FallbackInverse,
        }
    }

    fn bridge(self, via: Currency) -> RateTier {
        match self {
            Layer::Live => RateTier::LiveBridge(via),
            Layer::Fallback => RateTier::FallbackBridge(via),
        }
    }
}

fn usable(rate: &f64) -> bool {
    rate.is_finite() && *rate > 0.0
}

/// Direct, then inverse, then bridged lookup within one layer.
fn climb<L: RateLookup + ?Sized>(
    layer: Layer,
    lookup: &L,
    pair: CurrencyPair,
    intermediates: &[Currency],
) -> Option<(f64, RateTier)> {
    let (from, to) = (pair.base, pair.quote);

    lookup
        .direct(from, to)
        .filter(usable)
        .map(|rate| (rate, layer.direct()))
        .or_else(|| {
            lookup
                .inverse(from, to)
                .filter(usable)
                .map(|rate| (rate, layer.inverse()))
        })
        .or_else(|| {
            lookup
                .bridge(from, to, intermediates)
                .map(|(via, rate)| (rate, layer.bridge(via)))
        })
}

/// Converts amounts between currencies using live rates where possible.
#[derive(Clone)]
pub struct CurrencyConverter {
    cache: RateTableCache,
    fallback: Arc<FallbackRateTable>,
    intermediates: Arc<[Currency]>,
    metrics: SharedFxMetrics,
}

impl CurrencyConverter {
    /// Create a converter over `cache`, falling back to `fallback`.
    pub fn new(cache: RateTableCache, fallback: FallbackRateTable) -> Self {
        Self {
            cache,
            fallback: Arc::new(fallback),
            intermediates: Arc::from(DEFAULT_INTERMEDIATES.as_slice()),
            metrics: Arc::new(FxMetrics::new()),
        }
    }

    /// Replace the bridging intermediates.
    pub fn with_intermediates(mut self, intermediates: Vec<Currency>) -> Self {
        self.intermediates = Arc::from(intermediates);
        self
    }

    /// Record into an existing metrics instance.
    pub fn with_metrics(mut self, metrics: SharedFxMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> &RateTableCache {
        &self.cache
    }

    pub fn metrics(&self) -> &SharedFxMetrics {
        &self.metrics
    }

    pub fn intermediates(&self) -> &[Currency] {
        &self.intermediates
    }

    /// Resolve the rate for `from -> to` and report which tier answered.
    #[instrument(skip(self), fields(pair = %CurrencyPair::new(from, to)))]
    pub async fn resolve(&self, from: Currency, to: Currency) -> ResolvedRate {
        let pair = CurrencyPair::new(from, to);

        let (rate, tier) = if pair.is_identity() {
            (1.0, RateTier::Identity)
        } else {
            let live = self.live_table().await;
            live.as_deref()
                .and_then(|table| climb(Layer::Live, table, pair, &self.intermediates))
                .or_else(|| {
                    debug!("No live rate, trying fallback table");
                    climb(Layer::Fallback, self.fallback.as_ref(), pair, &self.intermediates)
                })
                .unwrap_or_else(|| {
                    warn!(pair = %pair, "No exchange rate could be determined, using 1:1");
                    (1.0, RateTier::LastResort)
                })
        };

        self.metrics.record_tier(tier);
        debug!(rate, tier = %tier, "Resolved rate");
        ResolvedRate { pair, rate, tier }
    }

    /// Rate for `from -> to`. Never fails.
    pub async fn rate(&self, from: Currency, to: Currency) -> f64 {
        self.resolve(from, to).await.rate
    }

    /// Convert `amount` from one currency to another. Never fails.
    pub async fn convert(&self, amount: f64, from: Currency, to: Currency) -> f64 {
        amount * self.rate(from, to).await
    }

    /// Convert a [`Money`] value into `to`.
    pub async fn convert_money(&self, money: Money, to: Currency) -> Money {
        Money::new(self.convert(money.value, money.currency, to).await, to)
    }

    async fn live_table(&self) -> Option<SharedRateTable> {
        match self.cache.table().await {
            Ok(table) => Some(table),
            Err(e) => {
                self.metrics.record_cache_error();
                warn!(error = %e, "Live rates unavailable");
                None
            }
        }
    }
}
