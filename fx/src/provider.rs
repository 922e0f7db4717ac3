//! Rate sources: the trait the cache fetches through and its HTTP implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use pocketbook_common::Currency;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::quote::{BankRate, RateQuote, RateTable};

/// Default endpoint of the public currency quote service.
pub const DEFAULT_SOURCE_URL: &str = "https://api.kursi.ge:8080/api/public/currencies";

/// Source of complete rate tables.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch a fresh table of quotes.
    async fn fetch_table(&self) -> FxResult<RateTable>;
}

/// One quote record as served by the remote service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRecord {
    base_currency_code: String,
    secondary_currency_code: String,
    buy_rate: f64,
    sell_rate: f64,
    #[serde(default)]
    bank_rates: HashMap<String, Option<BankRateRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankRateRecord {
    buy_rate: f64,
    sell_rate: f64,
}

impl QuoteRecord {
    /// Translate remote codes and keep the record only if it is usable.
    fn into_quote(self) -> Option<RateQuote> {
        let base = Currency::from_remote_code(&self.base_currency_code)?;
        let secondary = Currency::from_remote_code(&self.secondary_currency_code)?;

        let per_bank_rates = self
            .bank_rates
            .into_iter()
            .filter_map(|(bank, rate)| {
                rate.map(|r| {
                    (
                        bank,
                        BankRate {
                            buy_rate: r.buy_rate,
                            sell_rate: r.sell_rate,
                        },
                    )
                })
            })
            .collect();

        let quote = RateQuote {
            base,
            secondary,
            buy_rate: self.buy_rate,
            sell_rate: self.sell_rate,
            per_bank_rates,
        };
        quote.is_usable().then_some(quote)
    }
}

/// Decode the remote JSON payload into quotes.
///
/// The payload must be a JSON array. Individual records that fail to decode,
/// name currencies outside the supported set, or carry a non-positive buy
/// rate are dropped. A payload with nothing usable left is malformed.
pub fn decode_quotes(source_name: &str, body: &[u8]) -> FxResult<Vec<RateQuote>> {
    let records: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| FxError::malformed(source_name, e))?;
    let total = records.len();

    let quotes: Vec<RateQuote> = records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<QuoteRecord>(value) {
            Ok(record) => record.into_quote(),
            Err(e) => {
                debug!(source = source_name, error = %e, "Skipping undecodable quote record");
                None
            }
        })
        .collect();

    if quotes.is_empty() {
        return Err(FxError::malformed(
            source_name,
            format!("none of {} records were usable", total),
        ));
    }

    debug!(
        source = source_name,
        records = total,
        usable = quotes.len(),
        pairs = %remote_pairs(&quotes),
        "Decoded quote records"
    );
    Ok(quotes)
}

/// Render quote pairs with the codes the remote service used for them.
fn remote_pairs(quotes: &[RateQuote]) -> String {
    quotes
        .iter()
        .map(|q| format!("{}/{}", q.base.remote_code(), q.secondary.remote_code()))
        .collect::<Vec<_>>()
        .join(",")
}

/// HTTP rate source backed by the public kursi.ge currency endpoint.
pub struct KursiRateSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl KursiRateSource {
    const NAME: &'static str = "KURSI";

    /// Create a source for `url` whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    timeout_ms = timeout.as_millis() as u64,
                    "Could not build HTTP client with timeout, requests rely on the cache timeout"
                );
                Client::new()
            });

        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RateSource for KursiRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_table(&self) -> FxResult<RateTable> {
        info!(source = Self::NAME, url = %self.url, "Fetching exchange rates");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FxError::Timeout {
                    source_name: Self::NAME.to_string(),
                    after: self.timeout,
                }
            } else {
                FxError::fetch(Self::NAME, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::fetch(Self::NAME, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FxError::fetch(Self::NAME, e))?;

        let quotes = decode_quotes(Self::NAME, &body)?;
        Ok(RateTable::fetched_now(quotes))
    }
}

/// Scripted rate source for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    quotes: parking_lot::Mutex<Vec<RateQuote>>,
    failing: std::sync::atomic::AtomicBool,
    delay: parking_lot::Mutex<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source serving an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quotes: parking_lot::Mutex::new(Vec::new()),
            failing: std::sync::atomic::AtomicBool::new(false),
            delay: parking_lot::Mutex::new(Duration::ZERO),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a mock source serving `quotes`.
    pub fn with_quotes(quotes: Vec<RateQuote>) -> Self {
        let source = Self::new("mock");
        source.set_quotes(quotes);
        source
    }

    /// Replace the quotes served by subsequent fetches.
    pub fn set_quotes(&self, quotes: Vec<RateQuote>) {
        *self.quotes.lock() = quotes;
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Delay every fetch by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_table(&self) -> FxResult<RateTable> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(FxError::fetch(&self.name, "connection refused"));
        }

        let quotes = self.quotes.lock().clone();
        Ok(RateTable::fetched_now(quotes))
    }
}
