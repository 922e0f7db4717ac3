//! Owner-scoped in-memory storage.
//!
//! Every row belongs to exactly one user. Reads and writes for a row owned by
//! someone else behave exactly like reads and writes for a missing row.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use pocketbook_common::UserId;

use crate::error::{LedgerError, LedgerResult};

/// An entity stored per owner.
pub trait Owned: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Display + Send + Sync + 'static;

    /// Entity name used in not-found errors.
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;
    fn owner(&self) -> UserId;
}

/// Thread-safe table of owned rows. Clones share the same rows.
pub struct OwnedStore<T: Owned> {
    rows: Arc<DashMap<T::Id, T>>,
}

impl<T: Owned> Clone for OwnedStore<T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<T: Owned> Default for OwnedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Owned> OwnedStore<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, row: T) -> T {
        self.rows.insert(row.id(), row.clone());
        row
    }

    /// Get a row owned by `owner`.
    pub fn get(&self, id: T::Id, owner: UserId) -> LedgerResult<T> {
        self.rows
            .get(&id)
            .filter(|row| row.owner() == owner)
            .map(|row| row.value().clone())
            .ok_or_else(|| LedgerError::not_found(T::ENTITY, id))
    }

    /// All rows of `owner` matching `predicate`, in no particular order.
    pub fn list(&self, owner: UserId, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .iter()
            .filter(|row| row.owner() == owner && predicate(row.value()))
            .map(|row| row.value().clone())
            .collect()
    }

    /// First row of `owner` matching `predicate`.
    pub fn find(&self, owner: UserId, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.rows
            .iter()
            .find(|row| row.owner() == owner && predicate(row.value()))
            .map(|row| row.value().clone())
    }

    /// Apply `change` to a row. A change that fails leaves the row untouched.
    pub fn update(
        &self,
        id: T::Id,
        owner: UserId,
        change: impl FnOnce(&mut T) -> LedgerResult<()>,
    ) -> LedgerResult<T> {
        let mut row = self
            .rows
            .get_mut(&id)
            .filter(|row| row.owner() == owner)
            .ok_or_else(|| LedgerError::not_found(T::ENTITY, id))?;

        let mut updated = row.value().clone();
        change(&mut updated)?;
        *row = updated.clone();
        Ok(updated)
    }

    pub fn remove(&self, id: T::Id, owner: UserId) -> LedgerResult<T> {
        self.rows
            .remove_if(&id, |_, row| row.owner() == owner)
            .map(|(_, row)| row)
            .ok_or_else(|| LedgerError::not_found(T::ENTITY, id))
    }

    /// Drop every row of `owner`. Returns how many were removed.
    pub fn remove_owner(&self, owner: UserId) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| row.owner() != owner);
        before.saturating_sub(self.rows.len())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u32,
        owner: UserId,
        text: String,
    }

    impl Owned for Note {
        type Id = u32;
        const ENTITY: &'static str = "Note";

        fn id(&self) -> u32 {
            self.id
        }

        fn owner(&self) -> UserId {
            self.owner
        }
    }

    fn note(id: u32, owner: UserId, text: &str) -> Note {
        Note {
            id,
            owner,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_rows_are_invisible_to_other_owners() {
        let store = OwnedStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.insert(note(1, alice, "rent"));

        assert!(store.get(1, alice).is_ok());
        assert_eq!(
            store.get(1, bob).unwrap_err(),
            LedgerError::NotFound {
                entity: "Note",
                id: "1".to_string()
            }
        );
        assert!(store.list(bob, |_| true).is_empty());
        let denied = store.update(1, bob, |n| {
            n.text.clear();
            Ok(())
        });
        assert!(denied.is_err());
        assert!(store.remove(1, bob).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_update_leaves_row_untouched() {
        let store = OwnedStore::new();
        let owner = UserId::new();
        store.insert(note(7, owner, "groceries"));

        let result = store.update(7, owner, |n| {
            n.text = "changed".to_string();
            Err(LedgerError::Invalid("nope".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.get(7, owner).unwrap().text, "groceries");
    }

    #[test]
    fn test_list_find_and_remove() {
        let store = OwnedStore::new();
        let owner = UserId::new();
        store.insert(note(1, owner, "a"));
        store.insert(note(2, owner, "b"));

        assert_eq!(store.list(owner, |n| n.text == "b").len(), 1);
        assert_eq!(store.find(owner, |n| n.text == "a").unwrap().id, 1);

        let removed = store.remove(2, owner).unwrap();
        assert_eq!(removed.text, "b");
        assert!(store.get(2, owner).is_err());
    }

    #[test]
    fn test_remove_owner_keeps_other_owners() {
        let store = OwnedStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.insert(note(1, alice, "a"));
        store.insert(note(2, alice, "b"));
        store.insert(note(3, bob, "c"));

        assert_eq!(store.remove_owner(alice), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(3, bob).is_ok());
    }
}
