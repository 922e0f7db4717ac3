//! Pocketbook FX
//!
//! Exchange rate lookup and currency conversion.
//!
//! # Features
//!
//! - Remote rate table fetched over HTTP with a bounded timeout
//! - Single-slot table cache with TTL, stale serving and request coalescing
//! - Direct, inverse and bridged lookups over live and fallback rates
//! - Conversion never fails; unknown pairs degrade to `1:1` and are counted
//!
//! # Example
//!
//! ```rust,ignore
//! use pocketbook_common::Currency;
//! use pocketbook_fx::FxConfig;
//!
//! let converter = FxConfig::from_env().build_converter();
//!
//! let rate = converter.rate(Currency::Usd, Currency::Geo).await;
//! let lari = converter.convert(100.0, Currency::Usd, Currency::Geo).await;
//! ```

pub mod cache;
pub mod config;
pub mod converter;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod provider;
pub mod quote;

pub use cache::{CacheStats, RateCacheConfig, RateTableCache};
pub use config::FxConfig;
pub use converter::{CurrencyConverter, RateTier, ResolvedRate, DEFAULT_INTERMEDIATES};
pub use error::{FxError, FxResult};
pub use fallback::FallbackRateTable;
pub use metrics::{FxMetrics, FxMetricsSnapshot, SharedFxMetrics};
pub use provider::{KursiRateSource, RateSource};
pub use quote::{BankRate, RateLookup, RateQuote, RateTable, SharedRateTable};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
