//! FX configuration.

use std::sync::Arc;
use std::time::Duration;

use pocketbook_common::Currency;

use crate::cache::{RateCacheConfig, RateTableCache};
use crate::converter::{CurrencyConverter, DEFAULT_INTERMEDIATES};
use crate::fallback::FallbackRateTable;
use crate::provider::{KursiRateSource, DEFAULT_SOURCE_URL};

/// Configuration for the rate source, cache and converter.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// URL of the remote quote endpoint.
    pub source_url: String,
    /// Cache configuration.
    pub cache: RateCacheConfig,
    /// Bridging intermediates, tried in order.
    pub intermediates: Vec<Currency>,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            cache: RateCacheConfig::default(),
            intermediates: DEFAULT_INTERMEDIATES.to_vec(),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("POCKETBOOK_RATES_URL") {
            config.source_url = url;
        }

        if let Ok(ttl) = std::env::var("POCKETBOOK_RATES_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                config.cache.ttl = Duration::from_secs(secs);
            }
        }

        if let Ok(timeout) = std::env::var("POCKETBOOK_RATES_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.cache.fetch_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(list) = std::env::var("POCKETBOOK_RATES_INTERMEDIATES") {
            if let Some(intermediates) = parse_currency_list(&list) {
                config.intermediates = intermediates;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_url.is_empty() {
            return Err("Rate source URL cannot be empty".to_string());
        }

        if self.cache.ttl.is_zero() {
            return Err("Rate cache TTL cannot be zero".to_string());
        }

        if self.cache.fetch_timeout.is_zero() {
            return Err("Rate fetch timeout cannot be zero".to_string());
        }

        if self.cache.fetch_timeout >= self.cache.ttl {
            return Err("Rate fetch timeout must be shorter than the cache TTL".to_string());
        }

        Ok(())
    }

    /// Wire the HTTP source, cache and converter described by this config.
    pub fn build_converter(&self) -> CurrencyConverter {
        let source = Arc::new(KursiRateSource::new(
            self.source_url.clone(),
            self.cache.fetch_timeout,
        ));
        let cache = RateTableCache::new(source, self.cache.clone());

        CurrencyConverter::new(cache, FallbackRateTable::standard())
            .with_intermediates(self.intermediates.clone())
    }
}

/// Parse a comma separated list of currency codes. `None` if any is unknown.
fn parse_currency_list(list: &str) -> Option<Vec<Currency>> {
    list.split(',')
        .filter(|code| !code.trim().is_empty())
        .map(|code| code.parse().ok())
        .collect()
}
