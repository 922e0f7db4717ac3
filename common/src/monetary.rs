//! Monetary types for Pocketbook.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Currencies supported by Pocketbook.
///
/// The set is closed; anything else coming from outside is rejected at the
/// boundary rather than carried around as a free-form code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    /// Georgian lari, written `GEO` inside Pocketbook.
    Geo,
}

impl Currency {
    /// Every supported currency, in index order.
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Geo];

    /// Number of supported currencies.
    pub const COUNT: usize = Self::ALL.len();

    /// Get the currency code used inside Pocketbook.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Geo => "GEO",
        }
    }

    /// Get the code the remote quote service uses for this currency.
    ///
    /// The local lari code differs from the ISO one the quote service speaks.
    pub fn remote_code(&self) -> &'static str {
        match self {
            Currency::Geo => "GEL",
            other => other.code(),
        }
    }

    /// Map a remote quote service code back to a currency.
    pub fn from_remote_code(code: &str) -> Option<Self> {
        match code {
            "GEL" => Some(Currency::Geo),
            "GEO" => None,
            other => other.parse().ok(),
        }
    }

    /// Position of this currency in [`Currency::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Currency::Usd => 0,
            Currency::Eur => 1,
            Currency::Gbp => 2,
            Currency::Geo => 3,
        }
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        2
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnknownCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "GEO" => Ok(Currency::Geo),
            _ => Err(UnknownCurrencyError(s.to_string())),
        }
    }
}

/// Error when a currency code is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown currency code: {0}")]
pub struct UnknownCurrencyError(pub String);

/// A directed currency pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being converted from.
    pub base: Currency,
    /// Currency being converted to.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }

    /// Whether both sides are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A monetary amount with currency.
///
/// Amounts are plain `f64`; money is stored with two decimal places and
/// [`Money::round`] is applied before anything is shown to a user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: f64,
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: f64, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: 0.0,
            currency,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.value > 0.0
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0.0
    }

    /// Get the absolute value.
    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            currency: self.currency,
        }
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let factor = 10f64.powi(self.currency.decimal_places() as i32);
        Self {
            value: (self.value * factor).round() / factor,
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = self.currency.decimal_places() as usize;
        write!(f, "{:.*} {}", places, self.value, self.currency)
    }
}

impl Add for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn add(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value + other.value,
            currency: self.currency,
        })
    }
}

impl Sub for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn sub(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value - other.value,
            currency: self.currency,
        })
    }
}

impl Mul<f64> for Money {
    type Output = Money;

    fn mul(self, factor: f64) -> Self::Output {
        Money {
            value: self.value * factor,
            currency: self.currency,
        }
    }
}

/// Error when attempting operations on different currencies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Currency mismatch: expected {expected}, got {actual}")]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}
