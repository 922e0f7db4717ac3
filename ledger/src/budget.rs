//! Spending limits per category.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use pocketbook_common::{BudgetId, Currency, UserId};
use pocketbook_fx::CurrencyConverter;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{Owned, OwnedStore};

/// A monthly spending limit for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub owner: UserId,
    /// Unique per owner.
    pub category: String,
    pub maximum: f64,
    pub currency: Currency,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Budget {
    type Id = BudgetId;
    const ENTITY: &'static str = "Budget";

    fn id(&self) -> BudgetId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.owner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub category: String,
    pub maximum: f64,
    /// Defaults to the owner's currency.
    pub currency: Option<Currency>,
    pub theme: String,
}

impl NewBudget {
    pub fn new(category: impl Into<String>, maximum: f64, theme: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            maximum,
            currency: None,
            theme: theme.into(),
        }
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// Partial update. The category of a budget is fixed once created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetUpdate {
    pub maximum: Option<f64>,
    pub currency: Option<Currency>,
    pub theme: Option<String>,
}

/// Per-user budgets with a unique `(owner, category)` index.
///
/// Reads can present the maximum in a requested currency. The stored budget is
/// never rewritten by such a read.
#[derive(Clone)]
pub struct BudgetBook {
    store: OwnedStore<Budget>,
    categories: Arc<DashMap<(UserId, String), BudgetId>>,
    converter: Arc<CurrencyConverter>,
}

impl BudgetBook {
    pub fn new(converter: Arc<CurrencyConverter>) -> Self {
        Self {
            store: OwnedStore::new(),
            categories: Arc::new(DashMap::new()),
            converter,
        }
    }

    /// Create a budget. Fails with `Conflict` if the category already has one.
    pub fn create(
        &self,
        owner: UserId,
        default_currency: Currency,
        input: NewBudget,
    ) -> LedgerResult<Budget> {
        if input.category.trim().is_empty() {
            return Err(LedgerError::Invalid("category cannot be empty".to_string()));
        }
        validate_maximum(input.maximum)?;

        match self.categories.entry((owner, input.category.clone())) {
            Entry::Occupied(_) => Err(LedgerError::Conflict(format!(
                "Budget for category \"{}\" already exists",
                input.category
            ))),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let budget = self.store.insert(Budget {
                    id: BudgetId::new(),
                    owner,
                    category: input.category,
                    maximum: input.maximum,
                    currency: input.currency.unwrap_or(default_currency),
                    theme: input.theme,
                    created_at: now,
                    updated_at: now,
                });
                slot.insert(budget.id);

                info!(
                    budget_id = %budget.id,
                    owner = %owner,
                    category = %budget.category,
                    "Created budget"
                );
                Ok(budget)
            }
        }
    }

    /// All budgets of `owner` ordered by category, optionally shown in `currency`.
    #[instrument(skip(self))]
    pub async fn find_all(&self, owner: UserId, currency: Option<Currency>) -> Vec<Budget> {
        let mut budgets = self.store.list(owner, |_| true);
        budgets.sort_by(|a, b| a.category.cmp(&b.category));

        match currency {
            Some(currency) => {
                join_all(budgets.into_iter().map(|b| self.presented_in(b, currency))).await
            }
            None => budgets,
        }
    }

    pub async fn find_one(
        &self,
        id: BudgetId,
        owner: UserId,
        currency: Option<Currency>,
    ) -> LedgerResult<Budget> {
        let budget = self.store.get(id, owner)?;
        Ok(self.maybe_presented_in(budget, currency).await)
    }

    pub async fn find_by_category(
        &self,
        owner: UserId,
        category: &str,
        currency: Option<Currency>,
    ) -> LedgerResult<Budget> {
        let id = self
            .categories
            .get(&(owner, category.to_string()))
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::CategoryNotFound(category.to_string()))?;
        let budget = self.store.get(id, owner)?;
        Ok(self.maybe_presented_in(budget, currency).await)
    }

    pub fn update(&self, id: BudgetId, owner: UserId, update: BudgetUpdate) -> LedgerResult<Budget> {
        self.store.update(id, owner, |budget| {
            if let Some(maximum) = update.maximum {
                validate_maximum(maximum)?;
                budget.maximum = maximum;
            }
            if let Some(currency) = update.currency {
                budget.currency = currency;
            }
            if let Some(theme) = update.theme {
                budget.theme = theme;
            }
            budget.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn remove(&self, id: BudgetId, owner: UserId) -> LedgerResult<Budget> {
        let budget = self.store.remove(id, owner)?;
        self.categories.remove(&(owner, budget.category.clone()));
        info!(budget_id = %id, owner = %owner, "Removed budget");
        Ok(budget)
    }

    pub(crate) fn remove_owner(&self, owner: UserId) -> usize {
        self.categories.retain(|(o, _), _| *o != owner);
        self.store.remove_owner(owner)
    }

    async fn maybe_presented_in(&self, budget: Budget, currency: Option<Currency>) -> Budget {
        match currency {
            Some(currency) => self.presented_in(budget, currency).await,
            None => budget,
        }
    }

    async fn presented_in(&self, mut budget: Budget, currency: Currency) -> Budget {
        budget.maximum = self
            .converter
            .convert(budget.maximum, budget.currency, currency)
            .await;
        budget.currency = currency;
        budget
    }
}

fn validate_maximum(maximum: f64) -> LedgerResult<()> {
    if !maximum.is_finite() || maximum <= 0.0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketbook_fx::{FallbackRateTable, MockRateSource, RateCacheConfig, RateQuote, RateTableCache};

    fn converter(quotes: Vec<RateQuote>) -> Arc<CurrencyConverter> {
        let source = Arc::new(MockRateSource::with_quotes(quotes));
        let cache = RateTableCache::new(source, RateCacheConfig::default());
        Arc::new(CurrencyConverter::new(cache, FallbackRateTable::standard()))
    }

    fn book() -> BudgetBook {
        BudgetBook::new(converter(vec![RateQuote::new(
            Currency::Eur,
            Currency::Usd,
            1.08,
            1.1,
        )]))
    }

    #[tokio::test]
    async fn test_category_is_unique_per_owner() {
        let budgets = book();
        let alice = UserId::new();
        let bob = UserId::new();

        budgets
            .create(alice, Currency::Usd, NewBudget::new("Dining Out", 75.0, "#277C78"))
            .unwrap();
        let err = budgets
            .create(alice, Currency::Usd, NewBudget::new("Dining Out", 20.0, "#F2CDAC"))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Conflict("Budget for category \"Dining Out\" already exists".to_string())
        );

        assert!(budgets
            .create(bob, Currency::Usd, NewBudget::new("Dining Out", 20.0, "#F2CDAC"))
            .is_ok());
    }

    #[tokio::test]
    async fn test_find_all_sorted_and_converted() {
        let budgets = book();
        let owner = UserId::new();
        budgets
            .create(owner, Currency::Usd, NewBudget::new("Entertainment", 50.0, "#82C9D7"))
            .unwrap();
        budgets
            .create(
                owner,
                Currency::Usd,
                NewBudget::new("Bills", 100.0, "#626070").in_currency(Currency::Eur),
            )
            .unwrap();

        let raw = budgets.find_all(owner, None).await;
        assert_eq!(raw[0].category, "Bills");
        assert_eq!(raw[0].currency, Currency::Eur);

        let in_usd = budgets.find_all(owner, Some(Currency::Usd)).await;
        assert_eq!(in_usd[0].currency, Currency::Usd);
        assert!((in_usd[0].maximum - 108.0).abs() < 1e-9);
        assert_eq!(in_usd[1].maximum, 50.0);

        // Presentation does not rewrite the stored budget.
        let stored = budgets.find_one(raw[0].id, owner, None).await.unwrap();
        assert_eq!(stored.maximum, 100.0);
    }

    #[tokio::test]
    async fn test_find_by_category() {
        let budgets = book();
        let owner = UserId::new();
        budgets
            .create(owner, Currency::Eur, NewBudget::new("Groceries", 200.0, "#F2CDAC"))
            .unwrap();

        let found = budgets
            .find_by_category(owner, "Groceries", Some(Currency::Usd))
            .await
            .unwrap();
        assert!((found.maximum - 216.0).abs() < 1e-9);

        let missing = budgets.find_by_category(owner, "Travel", None).await;
        assert_eq!(
            missing.unwrap_err().to_string(),
            "Budget for category \"Travel\" not found"
        );
    }

    #[tokio::test]
    async fn test_update_validates_and_remove_frees_category() {
        let budgets = book();
        let owner = UserId::new();
        let budget = budgets
            .create(owner, Currency::Usd, NewBudget::new("Bills", 100.0, "#626070"))
            .unwrap();

        let bad = BudgetUpdate {
            maximum: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            budgets.update(budget.id, owner, bad).unwrap_err(),
            LedgerError::NonPositiveAmount
        );

        let good = BudgetUpdate {
            maximum: Some(150.0),
            theme: Some("#000000".to_string()),
            ..Default::default()
        };
        assert_eq!(budgets.update(budget.id, owner, good).unwrap().maximum, 150.0);

        budgets.remove(budget.id, owner).unwrap();
        assert!(budgets
            .create(owner, Currency::Usd, NewBudget::new("Bills", 90.0, "#626070"))
            .is_ok());
    }
}
