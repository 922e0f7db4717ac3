//! Aggregates across a user's records, expressed in one currency.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use pocketbook_common::{Currency, UserId};
use pocketbook_fx::CurrencyConverter;

use crate::pot::PotBook;
use crate::transaction::{Transaction, TransactionBook, TransactionQuery};

/// Income, expenses and what is left, in `currency`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub current: f64,
    pub income: f64,
    /// Sum of expense magnitudes.
    pub expenses: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
}

/// Read-only reporting over transactions and pots.
///
/// Every amount is converted through the shared [`CurrencyConverter`], so a
/// report never fails because rates are unavailable.
#[derive(Clone)]
pub struct Finances {
    transactions: TransactionBook,
    pots: PotBook,
    converter: Arc<CurrencyConverter>,
}

impl Finances {
    pub fn new(transactions: TransactionBook, pots: PotBook, converter: Arc<CurrencyConverter>) -> Self {
        Self {
            transactions,
            pots,
            converter,
        }
    }

    #[instrument(skip(self))]
    pub async fn balance(&self, owner: UserId, currency: Currency) -> Balance {
        let converted = self.converted_amounts(self.transactions.all(owner), currency).await;

        let (income, expenses) = converted
            .iter()
            .fold((0.0, 0.0), |(income, expenses), (tx, amount)| {
                if tx.is_income() {
                    (income + amount, expenses)
                } else {
                    (income, expenses + amount.abs())
                }
            });

        debug!(income, expenses, transactions = converted.len(), "Computed balance");
        Balance {
            current: income - expenses,
            income,
            expenses,
            currency,
        }
    }

    /// Total spent in `category`, in `currency`.
    #[instrument(skip(self))]
    pub async fn budget_spending(&self, owner: UserId, category: &str, currency: Currency) -> f64 {
        let expenses = self
            .transactions
            .by_category(owner, category)
            .into_iter()
            .filter(Transaction::is_expense)
            .collect();

        self.converted_amounts(expenses, currency)
            .await
            .iter()
            .map(|(_, amount)| amount.abs())
            .sum()
    }

    /// Spending per category in `currency`, ordered by category.
    #[instrument(skip(self))]
    pub async fn spending_by_category(&self, owner: UserId, currency: Currency) -> Vec<CategorySpending> {
        let expenses = self
            .transactions
            .all(owner)
            .into_iter()
            .filter(Transaction::is_expense)
            .collect();

        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for (tx, amount) in self.converted_amounts(expenses, currency).await {
            *totals.entry(tx.category).or_default() += amount.abs();
        }

        totals
            .into_iter()
            .map(|(category, amount)| CategorySpending { category, amount })
            .collect()
    }

    /// A page of transactions with amounts shown in `currency`.
    pub async fn transactions_in(
        &self,
        owner: UserId,
        query: &TransactionQuery,
        currency: Currency,
    ) -> Vec<Transaction> {
        let page = self.transactions.find_all(owner, query);
        self.converted_amounts(page, currency)
            .await
            .into_iter()
            .map(|(mut tx, amount)| {
                tx.amount = amount;
                tx.currency = currency;
                tx
            })
            .collect()
    }

    /// Money held across all pots, in `currency`.
    pub async fn total_saved(&self, owner: UserId, currency: Currency) -> f64 {
        let pots = self.pots.find_all(owner);
        join_all(
            pots.iter()
                .map(|pot| self.converter.convert(pot.total, pot.currency, currency)),
        )
        .await
        .into_iter()
        .sum()
    }

    pub async fn exchange_rate(&self, from: Currency, to: Currency) -> f64 {
        self.converter.rate(from, to).await
    }

    async fn converted_amounts(
        &self,
        transactions: Vec<Transaction>,
        currency: Currency,
    ) -> Vec<(Transaction, f64)> {
        let amounts = join_all(
            transactions
                .iter()
                .map(|tx| self.converter.convert(tx.amount, tx.currency, currency)),
        )
        .await;
        transactions.into_iter().zip(amounts).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pot::NewPot;
    use crate::transaction::NewTransaction;
    use chrono::Utc;
    use pocketbook_fx::{FallbackRateTable, MockRateSource, RateCacheConfig, RateQuote, RateTableCache};

    struct Fixture {
        finances: Finances,
        transactions: TransactionBook,
        pots: PotBook,
        source: Arc<MockRateSource>,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(MockRateSource::with_quotes(vec![RateQuote::new(
            Currency::Usd,
            Currency::Geo,
            2.5,
            2.6,
        )]));
        let cache = RateTableCache::new(source.clone(), RateCacheConfig::default());
        let converter = Arc::new(CurrencyConverter::new(cache, FallbackRateTable::standard()));

        let transactions = TransactionBook::new();
        let pots = PotBook::new();
        Fixture {
            finances: Finances::new(transactions.clone(), pots.clone(), converter),
            transactions,
            pots,
            source,
        }
    }

    fn record(book: &TransactionBook, owner: UserId, name: &str, category: &str, amount: f64, currency: Currency) {
        book.create(
            owner,
            Currency::Usd,
            NewTransaction::new(name, category, amount, Utc::now()).in_currency(currency),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_balance_across_currencies() {
        let fx = fixture();
        let owner = UserId::new();
        record(&fx.transactions, owner, "Salary", "General", 1000.0, Currency::Usd);
        record(&fx.transactions, owner, "Rent", "Bills", -500.0, Currency::Geo);
        record(&fx.transactions, owner, "Lunch", "Dining Out", -20.0, Currency::Usd);

        let balance = fx.finances.balance(owner, Currency::Geo).await;
        assert_eq!(balance.currency, Currency::Geo);
        assert!((balance.income - 2500.0).abs() < 1e-9);
        assert!((balance.expenses - 550.0).abs() < 1e-9);
        assert!((balance.current - 1950.0).abs() < 1e-9);

        // Only one fetch for every conversion in the report.
        assert_eq!(fx.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_balance_with_rates_offline_uses_fallback() {
        let fx = fixture();
        fx.source.set_failing(true);
        let owner = UserId::new();
        record(&fx.transactions, owner, "Salary", "General", 100.0, Currency::Usd);

        let balance = fx.finances.balance(owner, Currency::Geo).await;
        assert!((balance.income - 270.0).abs() < 1e-9);
        assert_eq!(balance.expenses, 0.0);
    }

    #[tokio::test]
    async fn test_empty_balance() {
        let fx = fixture();
        let balance = fx.finances.balance(UserId::new(), Currency::Eur).await;
        assert_eq!(
            balance,
            Balance {
                current: 0.0,
                income: 0.0,
                expenses: 0.0,
                currency: Currency::Eur,
            }
        );
    }

    #[tokio::test]
    async fn test_spending_reports() {
        let fx = fixture();
        let owner = UserId::new();
        record(&fx.transactions, owner, "Salary", "General", 1000.0, Currency::Usd);
        record(&fx.transactions, owner, "Market", "Groceries", -25.0, Currency::Geo);
        record(&fx.transactions, owner, "Bakery", "Groceries", -10.0, Currency::Usd);
        record(&fx.transactions, owner, "Power", "Bills", -40.0, Currency::Usd);

        let groceries = fx.finances.budget_spending(owner, "Groceries", Currency::Usd).await;
        assert!((groceries - 20.0).abs() < 1e-9);

        let by_category = fx.finances.spending_by_category(owner, Currency::Usd).await;
        let categories: Vec<_> = by_category.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(categories, vec!["Bills", "Groceries"]);
        assert!((by_category[0].amount - 40.0).abs() < 1e-9);
        assert!((by_category[1].amount - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_transactions_in_currency() {
        let fx = fixture();
        let owner = UserId::new();
        record(&fx.transactions, owner, "Lunch", "Dining Out", -10.0, Currency::Usd);

        let rows = fx
            .finances
            .transactions_in(owner, &TransactionQuery::default(), Currency::Geo)
            .await;
        assert_eq!(rows[0].currency, Currency::Geo);
        assert!((rows[0].amount + 25.0).abs() < 1e-9);

        let stored = fx.transactions.find_one(rows[0].id, owner).unwrap();
        assert_eq!(stored.amount, -10.0);
    }

    #[tokio::test]
    async fn test_total_saved_and_exchange_rate() {
        let fx = fixture();
        let owner = UserId::new();
        fx.pots
            .create(owner, Currency::Usd, NewPot::new("Trip", 1000.0, "#826CB0").starting_with(100.0))
            .unwrap();
        fx.pots
            .create(
                owner,
                Currency::Usd,
                NewPot::new("Laptop", 3000.0, "#277C78")
                    .starting_with(250.0)
                    .in_currency(Currency::Geo),
            )
            .unwrap();

        let saved = fx.finances.total_saved(owner, Currency::Usd).await;
        assert!((saved - 200.0).abs() < 1e-9);
        assert!((fx.finances.exchange_rate(Currency::Geo, Currency::Usd).await - 0.4).abs() < 1e-12);
    }
}
