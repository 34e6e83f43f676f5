//! In-memory transactional counter store for fast, deterministic tests.
//!
//! [`InMemoryCounterStore`] implements optimistic concurrency control the way a
//! snapshot-isolated document store does: every document carries a version, each
//! transaction remembers the versions it read, and commit fails with
//! [`StoreError::Conflict`] if any of them moved in the meantime.
//!
//! Faults can be scripted to exercise the allocator's failure paths:
//!
//! - [`InMemoryCounterStore::fail_next_commits`]: reject upcoming commits with a fault
//! - [`InMemoryCounterStore::set_unavailable`]: simulate a full outage

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use seqalloc_core::namespace::Namespace;
use seqalloc_core::store::{
    CounterDocument, StoreError, StoreFuture, StoreTransaction, TransactionalStore,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// A fault injected into an upcoming commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitFault {
    /// Reject the commit as if another writer had won the race.
    Conflict,
    /// Reject the commit as if the store had become unreachable.
    Unavailable,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    document: CounterDocument,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Namespace, Entry>,
    faults: VecDeque<CommitFault>,
    unavailable: bool,
    committed: u64,
    conflicts: u64,
}

impl Inner {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn version_of(&self, namespace: &Namespace) -> Option<u64> {
        self.entries.get(namespace).map(|entry| entry.version)
    }
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>, StoreError> {
    inner
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
}

/// Versioned in-memory counter store with optimistic conflict detection.
///
/// Cloning is cheap and every clone shares the same documents, so one store can back
/// several allocators to mimic independent processes sharing a database.
///
/// # Example
///
/// ```
/// use seqalloc_core::namespace::Namespace;
/// use seqalloc_core::store::{CounterDocument, TransactionalStore};
/// use seqalloc_testing::InMemoryCounterStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryCounterStore::new().with_counter("adminId", 2);
/// let namespace = Namespace::new("adminId");
///
/// let mut txn = store.begin().await?;
/// let current = txn.read(&namespace).await?;
/// assert_eq!(current, Some(CounterDocument::new(2)));
/// txn.write(&namespace, CounterDocument::new(3)).await?;
/// txn.commit().await?;
///
/// assert_eq!(store.counter("adminId"), Some(3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCounterStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`seed`](Self::seed).
    #[must_use]
    pub fn with_counter(self, namespace: impl Into<Namespace>, value: u64) -> Self {
        self.seed(namespace, value);
        self
    }

    /// Set a counter directly, outside any transaction.
    ///
    /// Bumps the document version, so transactions that already read it will conflict.
    pub fn seed(&self, namespace: impl Into<Namespace>, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        let namespace = namespace.into();
        let version = inner.version_of(&namespace).map_or(1, |v| v + 1);
        inner.entries.insert(
            namespace,
            Entry {
                document: CounterDocument::new(value),
                version,
            },
        );
    }

    /// The committed value of a counter, or `None` if it was never written.
    #[must_use]
    pub fn counter(&self, namespace: impl Into<Namespace>) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(&namespace.into())
            .map(|entry| entry.document.current_value)
    }

    /// Number of counter documents in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the store holds no counter documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `count` copies of `fault`; each upcoming commit consumes one.
    pub fn fail_next_commits(&self, count: usize, fault: CommitFault) {
        let mut inner = self.inner.lock().unwrap();
        inner.faults.extend(std::iter::repeat_n(fault, count));
    }

    /// Number of queued commit faults not yet consumed.
    #[must_use]
    pub fn pending_faults(&self) -> usize {
        self.inner.lock().unwrap().faults.len()
    }

    /// Take the whole store offline (or back online).
    ///
    /// While offline, `begin`, `read`, `commit` and `ping` fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// Number of successful commits.
    #[must_use]
    pub fn committed_transactions(&self) -> u64 {
        self.inner.lock().unwrap().committed
    }

    /// Number of commits rejected with a conflict, injected ones included.
    #[must_use]
    pub fn rejected_conflicts(&self) -> u64 {
        self.inner.lock().unwrap().conflicts
    }
}

impl TransactionalStore for InMemoryCounterStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            lock(&inner)?.check_available()?;
            Ok(Box::new(InMemoryTransaction {
                inner,
                read_versions: HashMap::new(),
                staged: HashMap::new(),
            }) as Box<dyn StoreTransaction>)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { lock(&inner)?.check_available() })
    }
}

/// A transaction against an [`InMemoryCounterStore`].
///
/// Holds no lock between calls. Dropping it without committing discards staged writes.
#[derive(Debug)]
pub struct InMemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    read_versions: HashMap<Namespace, Option<u64>>,
    staged: HashMap<Namespace, CounterDocument>,
}

impl StoreTransaction for InMemoryTransaction {
    fn read<'a>(
        &'a mut self,
        namespace: &'a Namespace,
    ) -> StoreFuture<'a, Option<CounterDocument>> {
        Box::pin(async move {
            if let Some(document) = self.staged.get(namespace) {
                return Ok(Some(*document));
            }

            let (document, version) = {
                let inner = lock(&self.inner)?;
                inner.check_available()?;
                let entry = inner.entries.get(namespace);
                (entry.map(|e| e.document), entry.map(|e| e.version))
            };

            match self.read_versions.get(namespace) {
                Some(seen) if *seen != version => {
                    return Err(StoreError::Conflict {
                        namespace: namespace.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.read_versions.insert(namespace.clone(), version);
                }
            }

            // Give other transactions a chance to run between read and commit, as a
            // network round-trip would.
            tokio::task::yield_now().await;

            Ok(document)
        })
    }

    fn write<'a>(
        &'a mut self,
        namespace: &'a Namespace,
        document: CounterDocument,
    ) -> StoreFuture<'a, ()> {
        self.staged.insert(namespace.clone(), document);
        Box::pin(async { Ok(()) })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let mut inner = lock(&self.inner)?;
            inner.check_available()?;

            match inner.faults.pop_front() {
                Some(CommitFault::Conflict) => {
                    inner.conflicts += 1;
                    let namespace = self
                        .staged
                        .keys()
                        .chain(self.read_versions.keys())
                        .next()
                        .cloned()
                        .unwrap_or_else(|| Namespace::new("unknown"));
                    return Err(StoreError::Conflict { namespace });
                }
                Some(CommitFault::Unavailable) => {
                    return Err(StoreError::Unavailable(
                        "injected commit failure".to_string(),
                    ));
                }
                None => {}
            }

            if let Some(namespace) = self
                .read_versions
                .iter()
                .find(|(namespace, seen)| inner.version_of(namespace) != **seen)
                .map(|(namespace, _)| namespace.clone())
            {
                inner.conflicts += 1;
                return Err(StoreError::Conflict { namespace });
            }

            for (namespace, document) in &self.staged {
                let version = inner.version_of(namespace).map_or(1, |v| v + 1);
                inner.entries.insert(
                    namespace.clone(),
                    Entry {
                        document: *document,
                        version,
                    },
                );
            }
            inner.committed += 1;
            Ok(())
        })
    }
}
