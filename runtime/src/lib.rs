//! # Seqalloc Runtime
//!
//! Runtime for the sequential identifier allocator.
//!
//! This crate provides the [`SequenceAllocator`], which drives one store transaction
//! per allocation and applies an explicit, bounded contention retry policy.
//!
//! ## Core Components
//!
//! - **`SequenceAllocator`**: read counter, increment, stage write, commit; retry on conflict
//! - **`RetryPolicy`**: attempt budget and jittered exponential backoff
//! - **`MetricsExporter`**: Prometheus recorder for allocation metrics
//!
//! ## Example
//!
//! ```ignore
//! use seqalloc_runtime::{RetryPolicy, SequenceAllocator};
//! use std::sync::Arc;
//!
//! let allocator = SequenceAllocator::new(Arc::new(store))
//!     .with_policy(RetryPolicy::builder().max_attempts(8).build());
//!
//! let allocation = allocator.allocate(&"driverId_OP001".into()).await?;
//! println!("allocated {}", allocation.value);
//! ```

/// Sequence allocation over a transactional store
pub mod allocator;

/// Retry logic with jittered exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

pub use allocator::{Allocation, SequenceAllocator};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
