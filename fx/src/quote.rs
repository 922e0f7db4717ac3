//! Exchange quotes, rate tables and the lookup strategies shared by live and
//! fallback data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pocketbook_common::{age_of, Currency, CurrencyPair, Timestamp};
use serde::{Deserialize, Serialize};

/// Buy/sell pair quoted by a single bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BankRate {
    pub buy_rate: f64,
    pub sell_rate: f64,
}

/// One directed exchange quote. Only `buy_rate` is used for conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub base: Currency,
    pub secondary: Currency,
    pub buy_rate: f64,
    pub sell_rate: f64,
    /// Per-bank quotes keyed by bank identifier (`TBC`, `BOG`, ...).
    pub per_bank_rates: HashMap<String, BankRate>,
}

impl RateQuote {
    /// Create a quote with no per-bank breakdown.
    pub fn new(base: Currency, secondary: Currency, buy_rate: f64, sell_rate: f64) -> Self {
        Self {
            base,
            secondary,
            buy_rate,
            sell_rate,
            per_bank_rates: HashMap::new(),
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base, self.secondary)
    }

    /// Whether the quote can be used for conversion at all.
    pub fn is_usable(&self) -> bool {
        self.buy_rate.is_finite() && self.buy_rate > 0.0
    }
}

/// An immutable snapshot of every quote returned by one fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    quotes: Vec<RateQuote>,
    fetched_at: Timestamp,
}

impl RateTable {
    pub fn new(quotes: Vec<RateQuote>, fetched_at: Timestamp) -> Self {
        Self { quotes, fetched_at }
    }

    /// Build a table stamped with the current time.
    pub fn fetched_now(quotes: Vec<RateQuote>) -> Self {
        Self::new(quotes, pocketbook_common::now())
    }

    pub fn quotes(&self) -> &[RateQuote] {
        &self.quotes
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Wall-clock age of the data.
    pub fn age(&self) -> Duration {
        age_of(self.fetched_at)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// First quote for the exact directed pair, if any.
    pub fn find(&self, base: Currency, secondary: Currency) -> Option<&RateQuote> {
        self.quotes
            .iter()
            .find(|q| q.base == base && q.secondary == secondary)
    }
}

/// Shared handle to a rate table.
pub type SharedRateTable = Arc<RateTable>;

/// Rate lookups over a set of directed quotes.
///
/// Implementors only say which explicit rates they carry; inversion and
/// bridging are derived identically for live and fallback data.
pub trait RateLookup {
    /// The explicit directed rate `from -> to`, if present.
    fn explicit_rate(&self, from: Currency, to: Currency) -> Option<f64>;

    /// Direct lookup.
    fn direct(&self, from: Currency, to: Currency) -> Option<f64> {
        self.explicit_rate(from, to)
    }

    /// Reciprocal of the opposite quote. Zero quotes never invert.
    fn inverse(&self, from: Currency, to: Currency) -> Option<f64> {
        self.explicit_rate(to, from)
            .filter(|rate| *rate != 0.0)
            .map(|rate| 1.0 / rate)
    }

    fn direct_or_inverse(&self, from: Currency, to: Currency) -> Option<f64> {
        self.direct(from, to).or_else(|| self.inverse(from, to))
    }

    /// Cross rate through the first intermediate whose both legs resolve to a
    /// finite positive product.
    ///
    /// Intermediates equal to `from` or `to` are skipped. The search stops at
    /// the first match in list order.
    fn bridge(&self, from: Currency, to: Currency, intermediates: &[Currency]) -> Option<(Currency, f64)> {
        intermediates
            .iter()
            .copied()
            .filter(|via| *via != from && *via != to)
            .find_map(|via| {
                let first_leg = self.direct_or_inverse(from, via)?;
                let second_leg = self.direct_or_inverse(via, to)?;
                let rate = first_leg * second_leg;
                (rate.is_finite() && rate > 0.0).then_some((via, rate))
            })
    }
}

impl RateLookup for RateTable {
    fn explicit_rate(&self, from: Currency, to: Currency) -> Option<f64> {
        self.find(from, to).map(|q| q.buy_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(quotes: Vec<RateQuote>) -> RateTable {
        RateTable::fetched_now(quotes)
    }

    #[test]
    fn test_direct_and_inverse_lookup() {
        let t = table(vec![RateQuote::new(Currency::Eur, Currency::Usd, 1.08, 1.10)]);

        assert_eq!(t.direct(Currency::Eur, Currency::Usd), Some(1.08));
        assert_eq!(t.direct(Currency::Usd, Currency::Eur), None);

        let inverse = t.inverse(Currency::Usd, Currency::Eur).unwrap();
        assert!((inverse - 0.9259).abs() < 1e-4);
    }

    #[test]
    fn test_zero_rate_is_not_inverted() {
        let t = table(vec![RateQuote::new(Currency::Eur, Currency::Usd, 0.0, 0.0)]);
        assert_eq!(t.inverse(Currency::Usd, Currency::Eur), None);
    }

    #[test]
    fn test_find_returns_first_duplicate() {
        let t = table(vec![
            RateQuote::new(Currency::Usd, Currency::Geo, 2.65, 2.70),
            RateQuote::new(Currency::Usd, Currency::Geo, 2.90, 2.95),
        ]);
        assert_eq!(t.direct(Currency::Usd, Currency::Geo), Some(2.65));
    }

    #[test]
    fn test_bridge_multiplies_legs() {
        let t = table(vec![
            RateQuote::new(Currency::Gbp, Currency::Usd, 1.25, 1.27),
            RateQuote::new(Currency::Usd, Currency::Geo, 2.70, 2.75),
        ]);

        let (via, rate) = t
            .bridge(Currency::Gbp, Currency::Geo, &[Currency::Usd, Currency::Geo, Currency::Eur])
            .unwrap();
        assert_eq!(via, Currency::Usd);
        assert!((rate - 1.25 * 2.70).abs() < 1e-12);
    }

    #[test]
    fn test_bridge_uses_inverse_legs() {
        // GEO->GBP: GEO->USD from inverse of USD->GEO, USD->GBP from inverse of GBP->USD.
        let t = table(vec![
            RateQuote::new(Currency::Gbp, Currency::Usd, 1.25, 1.27),
            RateQuote::new(Currency::Usd, Currency::Geo, 2.50, 2.55),
        ]);

        let (via, rate) = t
            .bridge(Currency::Geo, Currency::Gbp, &[Currency::Usd, Currency::Geo, Currency::Eur])
            .unwrap();
        assert_eq!(via, Currency::Usd);
        assert!((rate - (1.0 / 2.50) * (1.0 / 1.25)).abs() < 1e-12);
    }

    #[test]
    fn test_bridge_stops_at_first_intermediate() {
        let t = table(vec![
            RateQuote::new(Currency::Gbp, Currency::Eur, 1.15, 1.17),
            RateQuote::new(Currency::Eur, Currency::Geo, 2.90, 2.95),
            RateQuote::new(Currency::Gbp, Currency::Usd, 1.25, 1.27),
            RateQuote::new(Currency::Usd, Currency::Geo, 2.70, 2.75),
        ]);

        let (via, _) = t
            .bridge(Currency::Gbp, Currency::Geo, &[Currency::Usd, Currency::Geo, Currency::Eur])
            .unwrap();
        assert_eq!(via, Currency::Usd);

        let (via, _) = t
            .bridge(Currency::Gbp, Currency::Geo, &[Currency::Eur, Currency::Usd])
            .unwrap();
        assert_eq!(via, Currency::Eur);
    }

    #[test]
    fn test_bridge_moves_past_unusable_product() {
        let t = table(vec![
            RateQuote::new(Currency::Gbp, Currency::Usd, 1e200, 1e200),
            RateQuote::new(Currency::Usd, Currency::Geo, 1e200, 1e200),
            RateQuote::new(Currency::Gbp, Currency::Eur, 1.15, 1.17),
            RateQuote::new(Currency::Eur, Currency::Geo, 0.0, 0.0),
        ]);
        assert!(t
            .bridge(Currency::Gbp, Currency::Geo, &[Currency::Usd, Currency::Eur])
            .is_none());

        let t = table(vec![
            RateQuote::new(Currency::Gbp, Currency::Usd, 1e200, 1e200),
            RateQuote::new(Currency::Usd, Currency::Geo, 1e200, 1e200),
            RateQuote::new(Currency::Gbp, Currency::Eur, 1.15, 1.17),
            RateQuote::new(Currency::Eur, Currency::Geo, 2.90, 2.95),
        ]);
        let (via, rate) = t
            .bridge(Currency::Gbp, Currency::Geo, &[Currency::Usd, Currency::Eur])
            .unwrap();
        assert_eq!(via, Currency::Eur);
        assert!((rate - 1.15 * 2.90).abs() < 1e-12);
    }

    #[test]
    fn test_bridge_skips_endpoints() {
        let t = table(vec![RateQuote::new(Currency::Usd, Currency::Geo, 2.70, 2.75)]);
        assert!(t.bridge(Currency::Usd, Currency::Geo, &[Currency::Usd, Currency::Geo]).is_none());
    }
}
