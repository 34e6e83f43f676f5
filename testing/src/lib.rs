//! # Seqalloc Testing
//!
//! Testing utilities for the sequential identifier allocator.
//!
//! This crate provides:
//! - [`InMemoryCounterStore`]: a versioned, optimistic-concurrency counter store
//! - [`CommitFault`]: scripted commit failures (conflicts, outages)
//!
//! ## Example
//!
//! ```ignore
//! use seqalloc_runtime::SequenceAllocator;
//! use seqalloc_testing::{CommitFault, InMemoryCounterStore};
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn conflicts_are_retried() {
//!     let store = InMemoryCounterStore::new();
//!     store.fail_next_commits(2, CommitFault::Conflict);
//!
//!     let allocator = SequenceAllocator::new(Arc::new(store.clone()));
//!     let allocation = allocator.allocate(&"adminId".into()).await.unwrap();
//!     assert_eq!(allocation.value, 1);
//! }
//! ```

pub mod counter_store;

// Re-export commonly used items
pub use counter_store::{CommitFault, InMemoryCounterStore, InMemoryTransaction};
