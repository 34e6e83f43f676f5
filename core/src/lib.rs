//! # Seqalloc Core
//!
//! Core types and traits for the sequential identifier allocator.
//!
//! The allocator hands out unique, strictly increasing, human-readable identifiers
//! (booking, driver, admin and passenger ids) scoped per namespace. Correctness under
//! concurrency comes exclusively from the backing store's atomic transactions: there is
//! no lock service and no in-process mutual exclusion.
//!
//! ## Core Concepts
//!
//! - **Namespace**: the key of one independent allocation stream (`bookingId_OP001`, `adminId`)
//! - **Counter**: the persisted integer behind a namespace
//! - **Transactional store**: read, decide, write, commit; conflicting writers are rejected
//! - **Counter repository**: stages counter reads and writes inside a caller-owned transaction
//! - **Identifier formatting**: pure mapping from `(kind, scope, value)` to a display id
//!
//! ## Example
//!
//! ```
//! use seqalloc_core::identifier::{format_identifier, AllocationTarget, IdentifierKind};
//!
//! let target = AllocationTarget::new(IdentifierKind::Booking, Some("OP001")).unwrap();
//! assert_eq!(target.namespace().as_str(), "bookingId_OP001");
//! assert_eq!(format_identifier(IdentifierKind::Booking, "OP001", 1), "OP001/00000001");
//! ```

pub mod error;
pub mod identifier;
pub mod namespace;
pub mod repository;
pub mod store;

// Re-export commonly used types
pub use error::{AllocationError, ValidationError};
pub use identifier::{AllocationTarget, FormattedIdentifier, IdentifierKind, format_identifier};
pub use namespace::{Namespace, ScopeCode};
pub use repository::CounterRepository;
pub use store::{CounterDocument, StoreError, StoreTransaction, TransactionalStore};
