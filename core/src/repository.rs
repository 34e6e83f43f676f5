//! Counter repository: namespace to persisted counter value.
//!
//! The repository only stages reads and writes on a transaction owned by the caller.
//! It never begins or commits a transaction, and it never caches: a cached counter value
//! would be stale the moment another process commits.

use crate::namespace::Namespace;
use crate::store::{CounterDocument, StoreError, StoreTransaction};

/// Reads and writes counter documents inside a caller-supplied transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterRepository {
    max_value: u64,
}

impl Default for CounterRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterRepository {
    /// Create a repository whose counters may grow up to `u64::MAX`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_value: u64::MAX,
        }
    }

    /// Create a repository whose counters may not exceed `max_value`.
    ///
    /// Used for stores with a narrower integer type than `u64`.
    #[must_use]
    pub const fn with_max_value(max_value: u64) -> Self {
        Self { max_value }
    }

    /// The largest value a counter may hold.
    #[must_use]
    pub const fn max_value(&self) -> u64 {
        self.max_value
    }

    /// The value following `current`, or `None` if the counter is saturated.
    #[must_use]
    pub fn next_value(&self, current: u64) -> Option<u64> {
        current.checked_add(1).filter(|next| *next <= self.max_value)
    }

    /// Read the current value of `namespace`; an absent document reads as `0`.
    ///
    /// # Errors
    ///
    /// Propagates the transaction's read error.
    pub async fn read_or_default(
        &self,
        txn: &mut dyn StoreTransaction,
        namespace: &Namespace,
    ) -> Result<u64, StoreError> {
        let document = txn.read(namespace).await?;
        Ok(document.unwrap_or_default().current_value)
    }

    /// Stage `value` as the current value of `namespace`, creating the document if absent.
    ///
    /// # Errors
    ///
    /// Propagates the transaction's write error.
    pub async fn write(
        &self,
        txn: &mut dyn StoreTransaction,
        namespace: &Namespace,
        value: u64,
    ) -> Result<(), StoreError> {
        txn.write(namespace, CounterDocument::new(value)).await
    }
}
