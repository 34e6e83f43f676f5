//! The sequence allocator.
//!
//! One allocation is one store transaction:
//!
//! ```text
//! begin → read counter (absent = 0) → next = current + 1 → stage write → commit
//! ```
//!
//! A write conflict discards the whole attempt (no value is considered allocated) and
//! the read/compute/write sequence starts over against the current state, up to the
//! policy's attempt budget, with jittered exponential backoff in between. Any other store
//! error fails the allocation immediately: retrying an unreachable dependency is the
//! caller's business.
//!
//! The allocator holds no lock and no cached counter. Uniqueness across threads and
//! processes rests entirely on the store rejecting one of any two transactions that
//! read and wrote the same counter.
//!
//! # Cancellation
//!
//! Dropping an in-flight allocation drops its transaction. If the commit had not yet
//! happened, nothing is applied. If it had, the value is consumed even though the
//! caller never sees it.

use crate::metrics::AllocatorMetrics;
use crate::retry::{RetryError, RetryPolicy, retry_with_predicate};
use seqalloc_core::error::AllocationError;
use seqalloc_core::identifier::{AllocationTarget, FormattedIdentifier};
use seqalloc_core::namespace::Namespace;
use seqalloc_core::repository::CounterRepository;
use seqalloc_core::store::{StoreError, TransactionalStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::Instrument;

/// A committed allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// The namespace the value was allocated in.
    pub namespace: Namespace,
    /// The allocated value, exactly one above the value the winning attempt read.
    pub value: u64,
    /// Attempts made, the successful one included.
    pub attempts: u32,
}

/// Failure of a single transaction attempt.
#[derive(Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("counter is at its maximum value {0}")]
    Overflow(u64),
}

impl AttemptError {
    const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }
}

/// Allocates strictly increasing values per namespace.
///
/// Cheap to clone; clones share the store handle.
///
/// # Example
///
/// ```
/// use seqalloc_core::identifier::{AllocationTarget, IdentifierKind};
/// use seqalloc_runtime::SequenceAllocator;
/// use seqalloc_testing::InMemoryCounterStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let allocator = SequenceAllocator::new(Arc::new(InMemoryCounterStore::new()));
///
/// let target = AllocationTarget::new(IdentifierKind::Booking, Some("OP002"))?;
/// let id = allocator.allocate_identifier(&target).await?;
/// assert_eq!(id.as_str(), "OP002/00000001");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn TransactionalStore>,
    repository: CounterRepository,
    policy: RetryPolicy,
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("repository", &self.repository)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SequenceAllocator {
    /// Create an allocator over `store` with the default [`RetryPolicy`].
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        let repository = CounterRepository::with_max_value(store.max_counter_value());
        Self {
            store,
            repository,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the contention retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The contention retry policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Allocate the next value of `namespace`.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::ConflictExhausted`]: every attempt lost a write conflict
    /// - [`AllocationError::StoreUnavailable`]: the store failed with a non-conflict error
    /// - [`AllocationError::CounterOverflow`]: the counter cannot grow any further
    ///
    /// The persisted counter is unchanged in every error case.
    pub async fn allocate(&self, namespace: &Namespace) -> Result<Allocation, AllocationError> {
        let span = tracing::info_span!("allocate", namespace = %namespace);
        self.allocate_inner(namespace).instrument(span).await
    }

    /// Allocate for an already validated `target` and format the result.
    ///
    /// # Errors
    ///
    /// Same as [`allocate`](Self::allocate).
    pub async fn allocate_identifier(
        &self,
        target: &AllocationTarget,
    ) -> Result<FormattedIdentifier, AllocationError> {
        let allocation = self.allocate(&target.namespace()).await?;
        AllocatorMetrics::record_issued(target.kind().as_str());
        Ok(target.format(allocation.value))
    }

    /// The committed value of `namespace` (0 when nothing was allocated yet).
    ///
    /// Reads through a transaction that is dropped without committing, so it never
    /// mutates the counter.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::StoreUnavailable`] if the store cannot be read.
    pub async fn current(&self, namespace: &Namespace) -> Result<u64, AllocationError> {
        let mut txn = self.store.begin().await?;
        let value = self.repository.read_or_default(&mut *txn, namespace).await?;
        drop(txn);
        Ok(value)
    }

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::StoreUnavailable`] if it is not.
    pub async fn ping(&self) -> Result<(), AllocationError> {
        self.store.ping().await.map_err(AllocationError::from)
    }

    async fn allocate_inner(&self, namespace: &Namespace) -> Result<Allocation, AllocationError> {
        let started = Instant::now();

        let outcome = retry_with_predicate(
            &self.policy,
            |attempt| {
                self.attempt(namespace)
                    .instrument(tracing::debug_span!("attempt", attempt))
            },
            AttemptError::is_conflict,
        )
        .await;

        match outcome {
            Ok(retried) => {
                AllocatorMetrics::record_conflicts(retried.attempts - 1);
                AllocatorMetrics::record_allocation(retried.attempts, started.elapsed());
                tracing::debug!(
                    value = retried.value,
                    attempts = retried.attempts,
                    "Allocated"
                );
                Ok(Allocation {
                    namespace: namespace.clone(),
                    value: retried.value,
                    attempts: retried.attempts,
                })
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                AllocatorMetrics::record_conflicts(attempts);
                AllocatorMetrics::record_failure("conflict_exhausted", attempts, started.elapsed());
                tracing::error!(attempts, error = %last_error, "Allocation gave up under contention");
                Err(AllocationError::ConflictExhausted {
                    namespace: namespace.clone(),
                    attempts,
                })
            }
            Err(RetryError::Aborted { attempts, error }) => {
                AllocatorMetrics::record_conflicts(attempts - 1);
                let (reason, err) = match error {
                    AttemptError::Overflow(_) => (
                        "counter_overflow",
                        AllocationError::CounterOverflow {
                            namespace: namespace.clone(),
                        },
                    ),
                    AttemptError::Store(store_error) => {
                        ("store_unavailable", AllocationError::from(store_error))
                    }
                };
                AllocatorMetrics::record_failure(reason, attempts, started.elapsed());
                tracing::error!(attempts, error = %err, "Allocation failed");
                Err(err)
            }
        }
    }

    /// One read/compute/write/commit transaction.
    async fn attempt(&self, namespace: &Namespace) -> Result<u64, AttemptError> {
        let mut txn = self.store.begin().await?;

        let current = self.repository.read_or_default(&mut *txn, namespace).await?;
        let next = self
            .repository
            .next_value(current)
            .ok_or(AttemptError::Overflow(current))?;
        self.repository.write(&mut *txn, namespace, next).await?;

        txn.commit().await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqalloc_core::identifier::IdentifierKind;
    use seqalloc_testing::{CommitFault, InMemoryCounterStore};
    use std::time::Duration;

    fn allocator_over(store: &InMemoryCounterStore, max_attempts: u32) -> SequenceAllocator {
        SequenceAllocator::new(Arc::new(store.clone())).with_policy(
            RetryPolicy::builder()
                .max_attempts(max_attempts)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(2))
                .build(),
        )
    }

    #[tokio::test]
    async fn first_allocation_in_fresh_namespace_is_one() {
        let store = InMemoryCounterStore::new();
        let allocator = allocator_over(&store, 5);

        let allocation = allocator.allocate(&Namespace::new("adminId")).await.unwrap();

        assert_eq!(allocation.value, 1);
        assert_eq!(allocation.attempts, 1);
        assert_eq!(store.counter("adminId"), Some(1));
    }

    #[tokio::test]
    async fn resumes_from_persisted_value() {
        let store = InMemoryCounterStore::new().with_counter("driverId_OP001", 10);
        let allocator = allocator_over(&store, 5);

        let allocation = allocator
            .allocate(&Namespace::new("driverId_OP001"))
            .await
            .unwrap();

        assert_eq!(allocation.value, 11);
    }

    #[tokio::test]
    async fn conflicts_are_retried_without_gaps() {
        let store = InMemoryCounterStore::new();
        store.fail_next_commits(2, CommitFault::Conflict);
        let allocator = allocator_over(&store, 5);

        let allocation = allocator.allocate(&Namespace::new("adminId")).await.unwrap();

        assert_eq!(allocation.value, 1);
        assert_eq!(allocation.attempts, 3);
        assert_eq!(store.committed_transactions(), 1);
    }

    #[tokio::test]
    async fn conflict_budget_exhaustion_leaves_counter_untouched() {
        let store = InMemoryCounterStore::new().with_counter("adminId", 4);
        store.fail_next_commits(3, CommitFault::Conflict);
        let allocator = allocator_over(&store, 3);
        let namespace = Namespace::new("adminId");

        let err = allocator.allocate(&namespace).await.unwrap_err();

        assert_eq!(
            err,
            AllocationError::ConflictExhausted {
                namespace: namespace.clone(),
                attempts: 3,
            }
        );
        assert!(err.is_retryable());
        assert_eq!(store.counter("adminId"), Some(4));

        // The failed call consumed nothing.
        assert_eq!(allocator.allocate(&namespace).await.unwrap().value, 5);
    }

    #[tokio::test]
    async fn store_failure_is_not_retried() {
        let store = InMemoryCounterStore::new();
        store.fail_next_commits(1, CommitFault::Unavailable);
        store.fail_next_commits(1, CommitFault::Conflict);
        let allocator = allocator_over(&store, 5);

        let err = allocator.allocate(&Namespace::new("adminId")).await.unwrap_err();

        assert!(matches!(err, AllocationError::StoreUnavailable(_)));
        // The second fault was never reached: exactly one attempt was made.
        assert_eq!(store.pending_faults(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn offline_store_fails_fast() {
        let store = InMemoryCounterStore::new();
        store.set_unavailable(true);
        let allocator = allocator_over(&store, 5);

        assert!(matches!(
            allocator.allocate(&Namespace::new("passengerId")).await,
            Err(AllocationError::StoreUnavailable(_))
        ));
        assert!(allocator.ping().await.is_err());
    }

    #[tokio::test]
    async fn saturated_counter_overflows_without_writing() {
        let store = InMemoryCounterStore::new().with_counter("adminId", u64::MAX);
        let allocator = allocator_over(&store, 5);

        let err = allocator.allocate(&Namespace::new("adminId")).await.unwrap_err();

        assert!(matches!(err, AllocationError::CounterOverflow { .. }));
        assert_eq!(store.counter("adminId"), Some(u64::MAX));
        assert_eq!(store.committed_transactions(), 0);
    }

    #[tokio::test]
    async fn current_peeks_without_mutating() {
        let store = InMemoryCounterStore::new();
        let allocator = allocator_over(&store, 5);
        let namespace = Namespace::new("bookingId_OP001");

        assert_eq!(allocator.current(&namespace).await.unwrap(), 0);
        allocator.allocate(&namespace).await.unwrap();
        assert_eq!(allocator.current(&namespace).await.unwrap(), 1);
        assert_eq!(allocator.current(&namespace).await.unwrap(), 1);
        assert_eq!(store.committed_transactions(), 1);
    }

    #[tokio::test]
    async fn identifiers_use_the_target_namespace() {
        let store = InMemoryCounterStore::new();
        let allocator = allocator_over(&store, 5);
        let driver = AllocationTarget::new(IdentifierKind::Driver, Some("OP001")).unwrap();

        let first = allocator.allocate_identifier(&driver).await.unwrap();
        let second = allocator.allocate_identifier(&driver).await.unwrap();

        assert_eq!(first.as_str(), "OP001/DR0001");
        assert_eq!(second.as_str(), "OP001/DR0002");
        assert_eq!(store.counter("driverId_OP001"), Some(2));
    }

    #[test]
    fn default_policy_is_bounded() {
        let allocator = SequenceAllocator::new(Arc::new(InMemoryCounterStore::new()));
        assert_eq!(allocator.policy().max_attempts, 5);
    }
}
