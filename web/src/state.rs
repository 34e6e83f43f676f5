//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use seqalloc_runtime::SequenceAllocator;

/// State shared by every HTTP handler.
///
/// Holds no counter state of its own: the allocator is a handle to the shared store,
/// so any number of server instances can run side by side.
#[derive(Clone)]
pub struct AppState {
    /// The allocator serving every identifier endpoint.
    pub allocator: SequenceAllocator,
    /// Prometheus handle rendered on `GET /metrics`, if metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state around an allocator, with metrics disabled.
    #[must_use]
    pub const fn new(allocator: SequenceAllocator) -> Self {
        Self {
            allocator,
            metrics: None,
        }
    }

    /// Enable the `/metrics` endpoint with the given recorder handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
