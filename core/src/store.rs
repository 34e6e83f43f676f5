//! Transactional document store abstraction.
//!
//! The allocator's only source of concurrency correctness is the store's transaction
//! isolation. A store must provide at least optimistic (snapshot) conflict detection:
//! if two transactions both read a counter document and both write it, at most one of
//! them commits and the other is rejected with [`StoreError::Conflict`].
//!
//! # Contract
//!
//! - Reads inside a transaction never observe uncommitted writes of other transactions.
//! - Writes are staged and become visible atomically at commit, or never.
//! - Dropping a transaction without committing discards it. A caller that abandons an
//!   in-flight allocation therefore leaves no trace unless the commit already happened.
//!
//! # Implementations
//!
//! - `PostgresCounterStore` (in `seqalloc-postgres`): `SERIALIZABLE` transactions
//! - `InMemoryCounterStore` (in `seqalloc-testing`): versioned map with fault injection
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so that stores can
//! be shared as `Arc<dyn TransactionalStore>` and transactions passed around as
//! `Box<dyn StoreTransaction>`.

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// The persisted counter document of one namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDocument {
    /// Last allocated value; zero means nothing has been allocated yet.
    pub current_value: u64,
}

impl CounterDocument {
    /// Create a document holding `current_value`.
    #[must_use]
    pub const fn new(current_value: u64) -> Self {
        Self { current_value }
    }
}

/// Errors reported by a transactional store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another transaction modified the document between this transaction's read and
    /// its commit. The whole transaction was rejected and may be retried.
    #[error("Write conflict on namespace {namespace}")]
    Conflict {
        /// The contended namespace.
        namespace: Namespace,
    },

    /// The store could not be reached or failed for a reason other than a conflict.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A persisted document could not be interpreted as a counter.
    #[error("Invalid counter document for namespace {namespace}: {reason}")]
    InvalidDocument {
        /// The namespace whose document is invalid.
        namespace: Namespace,
        /// What is wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Whether this error is a write conflict (the only retryable store error).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// One open store transaction.
///
/// Reads and writes are staged on the transaction; nothing is visible to other
/// transactions until [`commit`](Self::commit) succeeds.
pub trait StoreTransaction: Send {
    /// Read the counter document of `namespace`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the store could not serve the read
    /// - `InvalidDocument`: the stored document is not a valid counter
    /// - `Conflict`: stores that detect conflicts eagerly may report them here
    fn read<'a>(&'a mut self, namespace: &'a Namespace)
    -> StoreFuture<'a, Option<CounterDocument>>;

    /// Stage `document` as the new counter document of `namespace`, creating it if absent.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the store rejected the write
    /// - `Conflict`: stores that detect conflicts eagerly may report them here
    fn write<'a>(
        &'a mut self,
        namespace: &'a Namespace,
        document: CounterDocument,
    ) -> StoreFuture<'a, ()>;

    /// Atomically apply every staged write.
    ///
    /// # Errors
    ///
    /// - `Conflict`: a document read by this transaction changed since it was read
    /// - `Unavailable`: the commit could not be performed; nothing was applied
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}

/// A document store offering atomic read-modify-write transactions.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one store handle is shared by every
/// concurrent allocation in a process, and several processes may share the backend.
pub trait TransactionalStore: Send + Sync {
    /// Open a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store cannot be reached.
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>>;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store cannot be reached.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// The largest counter value this store can persist.
    fn max_counter_value(&self) -> u64 {
        u64::MAX
    }
}

impl<T: TransactionalStore + ?Sized> TransactionalStore for Arc<T> {
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>> {
        (**self).begin()
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        (**self).ping()
    }

    fn max_counter_value(&self) -> u64 {
        (**self).max_counter_value()
    }
}
