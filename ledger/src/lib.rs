//! Pocketbook Ledger
//!
//! In-memory records of users, transactions, budgets and savings pots. Every
//! record belongs to one user and is invisible to everyone else. Reports and
//! currency-normalized reads go through the shared currency converter.

pub mod budget;
pub mod error;
pub mod finances;
pub mod pot;
pub mod store;
pub mod transaction;
pub mod user;

use std::sync::Arc;

use tracing::info;

use pocketbook_common::UserId;
use pocketbook_fx::CurrencyConverter;

pub use budget::{Budget, BudgetBook, BudgetUpdate, NewBudget};
pub use error::{LedgerError, LedgerResult};
pub use finances::{Balance, CategorySpending, Finances};
pub use pot::{NewPot, Pot, PotBook, PotUpdate};
pub use store::{Owned, OwnedStore};
pub use transaction::{
    NewTransaction, PaginationMeta, SortOrder, Transaction, TransactionBook, TransactionFilter,
    TransactionPage, TransactionQuery, TransactionSort, TransactionSortField, TransactionUpdate,
    DEFAULT_PAGE_SIZE,
};
pub use user::{User, UserDirectory};

/// All books of one process, sharing a converter.
#[derive(Clone)]
pub struct Ledger {
    users: UserDirectory,
    transactions: TransactionBook,
    budgets: BudgetBook,
    pots: PotBook,
    finances: Finances,
}

impl Ledger {
    pub fn new(converter: Arc<CurrencyConverter>) -> Self {
        let transactions = TransactionBook::new();
        let pots = PotBook::new();

        Self {
            users: UserDirectory::new(),
            budgets: BudgetBook::new(converter.clone()),
            finances: Finances::new(transactions.clone(), pots.clone(), converter),
            transactions,
            pots,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn transactions(&self) -> &TransactionBook {
        &self.transactions
    }

    pub fn budgets(&self) -> &BudgetBook {
        &self.budgets
    }

    pub fn pots(&self) -> &PotBook {
        &self.pots
    }

    pub fn finances(&self) -> &Finances {
        &self.finances
    }

    /// Record a transaction, defaulting its currency to the owner's.
    pub fn record_transaction(&self, owner: UserId, input: NewTransaction) -> LedgerResult<Transaction> {
        let user = self.users.find(owner)?;
        self.transactions.create(owner, user.currency, input)
    }

    /// Create a budget, defaulting its currency to the owner's.
    pub fn create_budget(&self, owner: UserId, input: NewBudget) -> LedgerResult<Budget> {
        let user = self.users.find(owner)?;
        self.budgets.create(owner, user.currency, input)
    }

    /// Create a pot, defaulting its currency to the owner's.
    pub fn create_pot(&self, owner: UserId, input: NewPot) -> LedgerResult<Pot> {
        let user = self.users.find(owner)?;
        self.pots.create(owner, user.currency, input)
    }

    /// Remove a user together with everything they own.
    pub fn remove_user(&self, owner: UserId) -> LedgerResult<User> {
        let user = self.users.remove(owner)?;
        let transactions = self.transactions.remove_owner(owner);
        let budgets = self.budgets.remove_owner(owner);
        let pots = self.pots.remove_owner(owner);

        info!(
            user_id = %owner,
            transactions,
            budgets,
            pots,
            "Removed user records"
        );
        Ok(user)
    }
}
