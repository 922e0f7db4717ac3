//! Static safety-net rates used when the live source cannot answer.

use pocketbook_common::Currency;

use crate::quote::RateLookup;

type RateMatrix = [[Option<f64>; Currency::COUNT]; Currency::COUNT];

/// Hand-maintained directed rates indexed by `(from, to)`.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRateTable {
    rates: RateMatrix,
}

impl FallbackRateTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            rates: [[None; Currency::COUNT]; Currency::COUNT],
        }
    }

    /// The rates shipped with Pocketbook.
    pub fn standard() -> Self {
        Self::empty()
            .with_rate(Currency::Usd, Currency::Geo, 2.7)
            .with_rate(Currency::Geo, Currency::Usd, 0.37)
    }

    /// Add or replace the `from -> to` rate.
    ///
    /// Identity pairs and rates that are not finite and positive are ignored.
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: f64) -> Self {
        if from != to && rate.is_finite() && rate > 0.0 {
            self.rates[from.index()][to.index()] = Some(rate);
        }
        self
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.rates.iter().flatten().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FallbackRateTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RateLookup for FallbackRateTable {
    fn explicit_rate(&self, from: Currency, to: Currency) -> Option<f64> {
        self.rates[from.index()][to.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rates() {
        let table = FallbackRateTable::standard();
        assert_eq!(table.direct(Currency::Usd, Currency::Geo), Some(2.7));
        assert_eq!(table.direct(Currency::Geo, Currency::Usd), Some(0.37));
        assert_eq!(table.direct(Currency::Usd, Currency::Eur), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_invalid_rates_are_ignored() {
        let table = FallbackRateTable::empty()
            .with_rate(Currency::Usd, Currency::Usd, 3.0)
            .with_rate(Currency::Usd, Currency::Eur, 0.0)
            .with_rate(Currency::Usd, Currency::Gbp, f64::NAN);
        assert!(table.is_empty());
    }

    #[test]
    fn test_inverse_from_single_entry() {
        let table = FallbackRateTable::empty().with_rate(Currency::Eur, Currency::Geo, 2.9);
        let rate = table.inverse(Currency::Geo, Currency::Eur).unwrap();
        assert!((rate * 2.9 - 1.0).abs() < 1e-12);
    }
}
