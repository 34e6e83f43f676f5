//! Error types for allocation requests.
//!
//! Three failure families reach callers, and they are kept distinct so that retry
//! decisions can be automated:
//!
//! - [`AllocationError::Validation`]: bad caller input, never retryable, nothing attempted
//! - [`AllocationError::ConflictExhausted`]: contention outlasted the retry budget, retryable
//! - [`AllocationError::StoreUnavailable`]: the store failed or was unreachable, retryable
//!
//! None of them leave a counter mutation behind.

use crate::identifier::IdentifierKind;
use crate::namespace::Namespace;
use crate::store::StoreError;
use thiserror::Error;

/// Caller input that was rejected before any transaction began.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A scoped identifier kind was requested without a scope code.
    #[error("scopeCode is required for {kind} identifiers")]
    MissingScope {
        /// The requested kind.
        kind: IdentifierKind,
    },

    /// A global identifier kind was requested with a scope code.
    #[error("scopeCode is not accepted for {kind} identifiers")]
    UnexpectedScope {
        /// The requested kind.
        kind: IdentifierKind,
    },

    /// The scope code is not well formed.
    #[error("Invalid scope code {value:?}: {reason}")]
    MalformedScope {
        /// The raw input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An empty namespace was supplied.
    #[error("Namespace cannot be empty")]
    EmptyNamespace,

    /// A formatted identifier does not match its kind's pattern.
    #[error("{input:?} is not a valid {kind} identifier")]
    MalformedIdentifier {
        /// The kind the input was parsed as.
        kind: IdentifierKind,
        /// The raw input.
        input: String,
    },

    /// The request body could not be decoded.
    #[error("Invalid request body: {0}")]
    MalformedRequest(String),
}

/// Errors returned by an allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Caller input was rejected; no transaction was attempted.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Every attempt lost a write conflict.
    ///
    /// Transient: the caller may invoke the allocation again from scratch.
    #[error("Allocation in namespace {namespace} gave up after {attempts} conflicting attempts")]
    ConflictExhausted {
        /// The contended namespace.
        namespace: Namespace,
        /// Number of attempts made, the first one included.
        attempts: u32,
    },

    /// The store was unreachable or failed with a non-conflict error.
    ///
    /// Not retried by the allocator; the caller applies its own policy.
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// The counter is already at the largest value the store can hold.
    #[error("Counter for namespace {namespace} cannot be incremented any further")]
    CounterOverflow {
        /// The saturated namespace.
        namespace: Namespace,
    },
}

impl AllocationError {
    /// Whether re-invoking the allocation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConflictExhausted { .. } | Self::StoreUnavailable(_)
        )
    }
}

impl From<StoreError> for AllocationError {
    /// Maps a store error that escaped the retry loop.
    ///
    /// A bare conflict only reaches this conversion outside the retry loop (for example
    /// from a read-only peek), where it counts as a single exhausted attempt.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { namespace } => Self::ConflictExhausted {
                namespace,
                attempts: 1,
            },
            other @ (StoreError::Unavailable(_) | StoreError::InvalidDocument { .. }) => {
                Self::StoreUnavailable(other.to_string())
            }
        }
    }
}
