//! Savings pots.
//!
//! A pot keeps `0 <= total <= target` at all times. Deposits that would
//! overflow the target and withdrawals larger than the total are rejected and
//! leave the pot as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use pocketbook_common::{Currency, Money, PotId, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{Owned, OwnedStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pot {
    pub id: PotId,
    pub owner: UserId,
    pub name: String,
    pub target: f64,
    pub total: f64,
    pub currency: Currency,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pot {
    /// Share of the target saved so far, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target > 0.0 {
            (self.total / self.target).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.target - self.total).max(0.0)
    }

    pub fn saved(&self) -> Money {
        Money::new(self.total, self.currency)
    }

    fn check_bounds(&self) -> LedgerResult<()> {
        if !self.target.is_finite() || self.target <= 0.0 {
            return Err(LedgerError::Invalid("target must be positive".to_string()));
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(LedgerError::Invalid("total cannot be negative".to_string()));
        }
        if self.total > self.target {
            return Err(LedgerError::ExceedsTarget);
        }
        Ok(())
    }
}

impl Owned for Pot {
    type Id = PotId;
    const ENTITY: &'static str = "Pot";

    fn id(&self) -> PotId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.owner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPot {
    pub name: String,
    pub target: f64,
    /// Starting balance, zero by default.
    pub total: f64,
    /// Defaults to the owner's currency.
    pub currency: Option<Currency>,
    pub theme: String,
}

impl NewPot {
    pub fn new(name: impl Into<String>, target: f64, theme: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target,
            total: 0.0,
            currency: None,
            theme: theme.into(),
        }
    }

    pub fn starting_with(mut self, total: f64) -> Self {
        self.total = total;
        self
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PotUpdate {
    pub name: Option<String>,
    pub target: Option<f64>,
    pub total: Option<f64>,
    pub currency: Option<Currency>,
    pub theme: Option<String>,
}

#[derive(Clone, Default)]
pub struct PotBook {
    store: OwnedStore<Pot>,
}

impl PotBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        owner: UserId,
        default_currency: Currency,
        input: NewPot,
    ) -> LedgerResult<Pot> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::Invalid("name cannot be empty".to_string()));
        }

        let now = Utc::now();
        let pot = Pot {
            id: PotId::new(),
            owner,
            name: input.name,
            target: input.target,
            total: input.total,
            currency: input.currency.unwrap_or(default_currency),
            theme: input.theme,
            created_at: now,
            updated_at: now,
        };
        pot.check_bounds()?;

        let pot = self.store.insert(pot);
        info!(pot_id = %pot.id, owner = %owner, target = pot.target, "Created pot");
        Ok(pot)
    }

    /// All pots of `owner` ordered by name.
    pub fn find_all(&self, owner: UserId) -> Vec<Pot> {
        let mut pots = self.store.list(owner, |_| true);
        pots.sort_by(|a, b| a.name.cmp(&b.name));
        pots
    }

    pub fn find_one(&self, id: PotId, owner: UserId) -> LedgerResult<Pot> {
        self.store.get(id, owner)
    }

    pub fn update(&self, id: PotId, owner: UserId, update: PotUpdate) -> LedgerResult<Pot> {
        self.store.update(id, owner, |pot| {
            if let Some(name) = update.name {
                pot.name = name;
            }
            if let Some(target) = update.target {
                pot.target = target;
            }
            if let Some(total) = update.total {
                pot.total = total;
            }
            if let Some(currency) = update.currency {
                pot.currency = currency;
            }
            if let Some(theme) = update.theme {
                pot.theme = theme;
            }
            pot.check_bounds()?;
            pot.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Move `amount` into the pot.
    pub fn add_money(&self, id: PotId, owner: UserId, amount: f64) -> LedgerResult<Pot> {
        validate_amount(amount)?;

        let pot = self.store.update(id, owner, |pot| {
            let total = pot.total + amount;
            if total > pot.target {
                return Err(LedgerError::ExceedsTarget);
            }
            pot.total = total;
            pot.updated_at = Utc::now();
            Ok(())
        })?;

        info!(pot_id = %id, amount, total = pot.total, "Added money to pot");
        Ok(pot)
    }

    /// Take `amount` out of the pot.
    pub fn withdraw_money(&self, id: PotId, owner: UserId, amount: f64) -> LedgerResult<Pot> {
        validate_amount(amount)?;

        let pot = self.store.update(id, owner, |pot| {
            if pot.total < amount {
                return Err(LedgerError::InsufficientFunds);
            }
            pot.total -= amount;
            pot.updated_at = Utc::now();
            Ok(())
        })?;

        info!(pot_id = %id, amount, total = pot.total, "Withdrew money from pot");
        Ok(pot)
    }

    pub fn remove(&self, id: PotId, owner: UserId) -> LedgerResult<Pot> {
        let pot = self.store.remove(id, owner)?;
        info!(pot_id = %id, owner = %owner, "Removed pot");
        Ok(pot)
    }

    pub(crate) fn remove_owner(&self, owner: UserId) -> usize {
        self.store.remove_owner(owner)
    }
}

fn validate_amount(amount: f64) -> LedgerResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    Ok(())
}
