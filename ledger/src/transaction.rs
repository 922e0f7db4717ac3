//! Income and expense records with filtering, sorting and pagination.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pocketbook_common::{Currency, Money, TransactionId, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{Owned, OwnedStore};

/// Page size used when a query does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A single transaction. Positive amounts are income, negative are expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner: UserId,
    pub name: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub currency: Currency,
    pub avatar: Option<String>,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }

    pub fn money(&self) -> Money {
        Money::new(self.amount, self.currency)
    }
}

impl Owned for Transaction {
    type Id = TransactionId;
    const ENTITY: &'static str = "Transaction";

    fn id(&self) -> TransactionId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.owner
    }
}

/// Input for a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub name: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub amount: f64,
    /// Defaults to the owner's currency.
    pub currency: Option<Currency>,
    pub avatar: Option<String>,
    pub recurring: bool,
}

impl NewTransaction {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        amount: f64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            date,
            amount,
            currency: None,
            avatar: None,
            recurring: false,
        }
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn recurring(mut self) -> Self {
        self.recurring = true;
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub currency: Option<Currency>,
    pub avatar: Option<String>,
    pub recurring: Option<bool>,
}

/// Conditions a transaction must meet to be listed. Unset fields match all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Substring of the name.
    pub name: Option<String>,
    pub category: Option<String>,
    pub currency: Option<Currency>,
    pub recurring: Option<bool>,
    /// Inclusive bounds on the signed amount.
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Inclusive bounds on the transaction date.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.name.as_ref().map_or(true, |name| tx.name.contains(name.as_str()))
            && self.category.as_ref().map_or(true, |c| &tx.category == c)
            && self.currency.map_or(true, |c| tx.currency == c)
            && self.recurring.map_or(true, |r| tx.recurring == r)
            && self.min_amount.map_or(true, |min| tx.amount >= min)
            && self.max_amount.map_or(true, |max| tx.amount <= max)
            && self.start_date.map_or(true, |start| tx.date >= start)
            && self.end_date.map_or(true, |end| tx.date <= end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionSortField {
    Name,
    Category,
    #[default]
    Date,
    Amount,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort key and direction. Defaults to newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSort {
    pub field: TransactionSortField,
    pub order: SortOrder,
}

impl TransactionSort {
    pub fn new(field: TransactionSortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    fn compare(&self, a: &Transaction, b: &Transaction) -> Ordering {
        let ordering = match self.field {
            TransactionSortField::Name => a.name.cmp(&b.name),
            TransactionSortField::Category => a.category.cmp(&b.category),
            TransactionSortField::Date => a.date.cmp(&b.date),
            TransactionSortField::Amount => a.amount.total_cmp(&b.amount),
            TransactionSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
        .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()));

        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Filter, sort and window for a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub filter: TransactionFilter,
    pub sort: TransactionSort,
    pub skip: usize,
    /// Zero means [`DEFAULT_PAGE_SIZE`].
    pub take: usize,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            filter: TransactionFilter::default(),
            sort: TransactionSort::default(),
            skip: 0,
            take: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TransactionQuery {
    pub fn filtered(filter: TransactionFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: TransactionSortField, order: SortOrder) -> Self {
        self.sort = TransactionSort::new(field, order);
        self
    }

    pub fn page(mut self, skip: usize, take: usize) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    fn page_size(&self) -> usize {
        if self.take == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.take
        }
    }
}

/// Position of a page within the full result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_count: usize,
    pub total_pages: usize,
    /// One-based.
    pub current_page: usize,
    pub page_size: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMeta {
    fn new(total_count: usize, skip: usize, page_size: usize) -> Self {
        Self {
            total_count,
            total_pages: total_count.div_ceil(page_size),
            current_page: skip / page_size + 1,
            page_size,
            has_next_page: skip + page_size < total_count,
            has_previous_page: skip > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub pagination: PaginationMeta,
}

/// Per-user transaction records.
#[derive(Clone, Default)]
pub struct TransactionBook {
    store: OwnedStore<Transaction>,
}

impl TransactionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction. Its currency defaults to `default_currency`.
    pub fn create(
        &self,
        owner: UserId,
        default_currency: Currency,
        input: NewTransaction,
    ) -> LedgerResult<Transaction> {
        validate_name(&input.name)?;
        validate_amount(input.amount)?;

        let now = Utc::now();
        let tx = self.store.insert(Transaction {
            id: TransactionId::new(),
            owner,
            name: input.name,
            category: input.category,
            date: input.date,
            amount: input.amount,
            currency: input.currency.unwrap_or(default_currency),
            avatar: input.avatar,
            recurring: input.recurring,
            created_at: now,
            updated_at: now,
        });

        info!(
            transaction_id = %tx.id,
            owner = %owner,
            amount = %tx.money(),
            category = %tx.category,
            "Recorded transaction"
        );
        Ok(tx)
    }

    /// One page of the owner's transactions.
    pub fn find_all(&self, owner: UserId, query: &TransactionQuery) -> Vec<Transaction> {
        self.page(owner, query).transactions
    }

    /// One page of the owner's transactions along with pagination details.
    pub fn page(&self, owner: UserId, query: &TransactionQuery) -> TransactionPage {
        let mut matching = self.store.list(owner, |tx| query.filter.matches(tx));
        matching.sort_by(|a, b| query.sort.compare(a, b));

        let page_size = query.page_size();
        let pagination = PaginationMeta::new(matching.len(), query.skip, page_size);
        let transactions = matching
            .into_iter()
            .skip(query.skip)
            .take(page_size)
            .collect::<Vec<_>>();

        debug!(
            owner = %owner,
            total = pagination.total_count,
            returned = transactions.len(),
            "Listed transactions"
        );
        TransactionPage {
            transactions,
            pagination,
        }
    }

    /// Every transaction of `owner`, unordered.
    pub fn all(&self, owner: UserId) -> Vec<Transaction> {
        self.store.list(owner, |_| true)
    }

    pub fn find_one(&self, id: TransactionId, owner: UserId) -> LedgerResult<Transaction> {
        self.store.get(id, owner)
    }

    pub fn update(
        &self,
        id: TransactionId,
        owner: UserId,
        update: TransactionUpdate,
    ) -> LedgerResult<Transaction> {
        self.store.update(id, owner, |tx| {
            if let Some(name) = update.name {
                validate_name(&name)?;
                tx.name = name;
            }
            if let Some(amount) = update.amount {
                validate_amount(amount)?;
                tx.amount = amount;
            }
            if let Some(category) = update.category {
                tx.category = category;
            }
            if let Some(date) = update.date {
                tx.date = date;
            }
            if let Some(currency) = update.currency {
                tx.currency = currency;
            }
            if let Some(avatar) = update.avatar {
                tx.avatar = Some(avatar);
            }
            if let Some(recurring) = update.recurring {
                tx.recurring = recurring;
            }
            tx.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn remove(&self, id: TransactionId, owner: UserId) -> LedgerResult<Transaction> {
        let tx = self.store.remove(id, owner)?;
        info!(transaction_id = %id, owner = %owner, "Removed transaction");
        Ok(tx)
    }

    /// Recurring transactions, newest first.
    pub fn recurring(&self, owner: UserId) -> Vec<Transaction> {
        self.newest_first(owner, |tx| tx.recurring)
    }

    /// Transactions in `category`, newest first.
    pub fn by_category(&self, owner: UserId, category: &str) -> Vec<Transaction> {
        self.newest_first(owner, |tx| tx.category == category)
    }

    pub(crate) fn remove_owner(&self, owner: UserId) -> usize {
        self.store.remove_owner(owner)
    }

    fn newest_first(&self, owner: UserId, predicate: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let mut rows = self.store.list(owner, predicate);
        rows.sort_by(|a, b| TransactionSort::default().compare(a, b));
        rows
    }
}

fn validate_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Invalid("name cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_amount(amount: f64) -> LedgerResult<()> {
    if !amount.is_finite() {
        return Err(LedgerError::Invalid(format!("amount must be finite, got {amount}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    fn seed(book: &TransactionBook, owner: UserId) {
        let rows = [
            NewTransaction::new("Salary", "General", 3000.0, day(1)).recurring(),
            NewTransaction::new("Groceries", "Food", -85.5, day(3)),
            NewTransaction::new("Grocery top-up", "Food", -12.0, day(9)),
            NewTransaction::new("Cinema", "Entertainment", -20.0, day(5)).in_currency(Currency::Geo),
            NewTransaction::new("Streaming", "Bills", -15.0, day(7)).recurring(),
        ];
        for row in rows {
            book.create(owner, Currency::Usd, row).unwrap();
        }
    }

    fn names(rows: &[Transaction]) -> Vec<&str> {
        rows.iter().map(|tx| tx.name.as_str()).collect()
    }

    #[test]
    fn test_create_defaults_currency() {
        let book = TransactionBook::new();
        let owner = UserId::new();

        let tx = book
            .create(owner, Currency::Geo, NewTransaction::new("Rent", "Bills", -900.0, day(1)))
            .unwrap();
        assert_eq!(tx.currency, Currency::Geo);
        assert!(tx.is_expense());

        let tx = book
            .create(
                owner,
                Currency::Geo,
                NewTransaction::new("Bonus", "General", 100.0, day(2)).in_currency(Currency::Eur),
            )
            .unwrap();
        assert_eq!(tx.currency, Currency::Eur);
        assert!(tx.is_income());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        assert!(book
            .create(owner, Currency::Usd, NewTransaction::new(" ", "Food", -1.0, day(1)))
            .is_err());
        assert!(book
            .create(owner, Currency::Usd, NewTransaction::new("x", "Food", f64::NAN, day(1)))
            .is_err());
    }

    #[test]
    fn test_default_listing_is_newest_first() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        seed(&book, owner);

        let rows = book.find_all(owner, &TransactionQuery::default());
        assert_eq!(
            names(&rows),
            vec!["Grocery top-up", "Streaming", "Cinema", "Groceries", "Salary"]
        );
    }

    #[test]
    fn test_filters() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        seed(&book, owner);

        let by_name = TransactionQuery::filtered(TransactionFilter {
            name: Some("Grocer".to_string()),
            ..Default::default()
        });
        assert_eq!(book.find_all(owner, &by_name).len(), 2);

        let expenses_over_15 = TransactionQuery::filtered(TransactionFilter {
            min_amount: Some(-20.0),
            max_amount: Some(0.0),
            ..Default::default()
        });
        assert_eq!(
            names(&book.find_all(owner, &expenses_over_15)),
            vec!["Grocery top-up", "Streaming", "Cinema"]
        );

        let window = TransactionQuery::filtered(TransactionFilter {
            start_date: Some(day(3)),
            end_date: Some(day(7)),
            recurring: Some(false),
            ..Default::default()
        });
        assert_eq!(names(&book.find_all(owner, &window)), vec!["Cinema", "Groceries"]);

        let lari = TransactionQuery::filtered(TransactionFilter {
            currency: Some(Currency::Geo),
            ..Default::default()
        });
        assert_eq!(names(&book.find_all(owner, &lari)), vec!["Cinema"]);
    }

    #[test]
    fn test_sort_and_paginate() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        seed(&book, owner);

        let query = TransactionQuery::default()
            .sorted_by(TransactionSortField::Amount, SortOrder::Asc)
            .page(1, 2);
        let page = book.page(owner, &query);

        assert_eq!(names(&page.transactions), vec!["Cinema", "Streaming"]);
        assert_eq!(
            page.pagination,
            PaginationMeta {
                total_count: 5,
                total_pages: 3,
                current_page: 1,
                page_size: 2,
                has_next_page: true,
                has_previous_page: true,
            }
        );

        let last = book.page(owner, &TransactionQuery::default().page(4, 2));
        assert_eq!(last.transactions.len(), 1);
        assert!(!last.pagination.has_next_page);
    }

    #[test]
    fn test_zero_take_uses_default_page_size() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        for i in 0..60 {
            book.create(owner, Currency::Usd, NewTransaction::new(format!("t{i}"), "Misc", -1.0, day(1)))
                .unwrap();
        }

        let page = book.page(owner, &TransactionQuery::default().page(0, 0));
        assert_eq!(page.transactions.len(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.pagination.total_pages, 2);
    }

    #[test]
    fn test_update_and_remove_are_owner_scoped() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        let stranger = UserId::new();
        let tx = book
            .create(owner, Currency::Usd, NewTransaction::new("Taxi", "Transport", -9.0, day(2)))
            .unwrap();

        let update = TransactionUpdate {
            amount: Some(-11.0),
            recurring: Some(true),
            ..Default::default()
        };
        assert!(book.update(tx.id, stranger, update.clone()).is_err());

        let updated = book.update(tx.id, owner, update).unwrap();
        assert_eq!(updated.amount, -11.0);
        assert_eq!(book.recurring(owner).len(), 1);

        assert!(book.remove(tx.id, stranger).is_err());
        book.remove(tx.id, owner).unwrap();
        assert!(matches!(
            book.find_one(tx.id, owner),
            Err(LedgerError::NotFound { entity: "Transaction", .. })
        ));
    }

    #[test]
    fn test_by_category() {
        let book = TransactionBook::new();
        let owner = UserId::new();
        seed(&book, owner);

        assert_eq!(
            names(&book.by_category(owner, "Food")),
            vec!["Grocery top-up", "Groceries"]
        );
        assert!(book.by_category(UserId::new(), "Food").is_empty());
    }
}
