//! Users and their preferred currency.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use pocketbook_common::{Currency, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{Owned, OwnedStore};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Unique across all users, stored lower-cased.
    pub email: String,
    /// Currency new records default to.
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for User {
    type Id = UserId;
    const ENTITY: &'static str = "User";

    fn id(&self) -> UserId {
        self.id
    }

    // A user owns its own row.
    fn owner(&self) -> UserId {
        self.id
    }
}

/// Registry of users with a unique email index.
#[derive(Clone, Default)]
pub struct UserDirectory {
    users: OwnedStore<User>,
    emails: Arc<DashMap<String, UserId>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. Fails with `Conflict` if the email is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        email: &str,
        currency: Currency,
    ) -> LedgerResult<User> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::Invalid("name cannot be empty".to_string()));
        }

        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(LedgerError::Invalid(format!("invalid email: {email}")));
        }

        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => Err(LedgerError::Conflict(format!(
                "User with email {email} already exists"
            ))),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = self.users.insert(User {
                    id: UserId::new(),
                    name,
                    email,
                    currency,
                    created_at: now,
                    updated_at: now,
                });
                slot.insert(user.id);

                info!(user_id = %user.id, currency = %user.currency, "Registered user");
                Ok(user)
            }
        }
    }

    pub fn find(&self, id: UserId) -> LedgerResult<User> {
        self.users.get(id, id)
    }

    pub fn find_by_email(&self, email: &str) -> LedgerResult<User> {
        let email = normalize_email(email);
        let id = self
            .emails
            .get(&email)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::not_found(User::ENTITY, &email))?;
        self.find(id)
    }

    /// Change the currency new records of this user default to.
    pub fn set_currency(&self, id: UserId, currency: Currency) -> LedgerResult<User> {
        self.users.update(id, id, |user| {
            user.currency = currency;
            user.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn remove(&self, id: UserId) -> LedgerResult<User> {
        let user = self.users.remove(id, id)?;
        self.emails.remove(&user.email);
        info!(user_id = %id, "Removed user");
        Ok(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let users = UserDirectory::new();
        let user = users
            .register("Nino", " Nino@Example.com ", Currency::Geo)
            .unwrap();

        assert_eq!(user.email, "nino@example.com");
        assert_eq!(users.find(user.id).unwrap(), user);
        assert_eq!(users.find_by_email("NINO@example.com").unwrap().id, user.id);
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let users = UserDirectory::new();
        users.register("A", "a@example.com", Currency::Usd).unwrap();

        let err = users
            .register("B", "A@EXAMPLE.COM", Currency::Eur)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_invalid_registration() {
        let users = UserDirectory::new();
        assert!(users.register("", "x@example.com", Currency::Usd).is_err());
        assert!(users.register("X", "nope", Currency::Usd).is_err());
        assert!(users.is_empty());
    }

    #[test]
    fn test_set_currency_and_remove_frees_email() {
        let users = UserDirectory::new();
        let user = users.register("A", "a@example.com", Currency::Usd).unwrap();

        let updated = users.set_currency(user.id, Currency::Gbp).unwrap();
        assert_eq!(updated.currency, Currency::Gbp);

        users.remove(user.id).unwrap();
        assert!(users.find(user.id).is_err());
        assert!(users.register("A", "a@example.com", Currency::Usd).is_ok());
    }
}
