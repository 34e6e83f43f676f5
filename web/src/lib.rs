//! HTTP surface for the sequence allocator.
//!
//! Exposes one `POST` endpoint per identifier kind plus health, readiness and metrics
//! endpoints. Handlers validate input, delegate to a shared
//! [`SequenceAllocator`](seqalloc_runtime::SequenceAllocator), and map
//! [`AllocationError`](seqalloc_core::error::AllocationError) onto HTTP statuses:
//!
//! | Error                | Status | Code                 |
//! |----------------------|--------|----------------------|
//! | validation           | 422    | `VALIDATION_ERROR`   |
//! | conflicts exhausted  | 503    | `CONFLICT_EXHAUSTED` |
//! | store unavailable    | 503    | `STORE_UNAVAILABLE`  |
//! | counter overflow     | 500    | `COUNTER_OVERFLOW`   |
//!
//! # Example
//!
//! ```ignore
//! use seqalloc_runtime::SequenceAllocator;
//! use seqalloc_web::{build_router, AppState};
//!
//! let state = AppState::new(SequenceAllocator::new(store));
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use middleware::{request_id_layer, RequestId, REQUEST_ID_HEADER};
pub use router::build_router;
pub use state::AppState;
