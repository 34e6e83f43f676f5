//! Prometheus metrics for the allocator.
//!
//! Allocation outcomes, contention and latency are recorded through the `metrics`
//! facade. [`MetricsExporter`] installs the Prometheus recorder; the web layer renders
//! it on `GET /metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use seqalloc_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs the process-wide recorder and keeps the handle used to render it.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one recorder can be installed per process. If one already is (e.g. in
    /// tests), this logs a warning and leaves the exporter without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .set_buckets_for_metric(
                Matcher::Full("seqalloc_allocation_attempts".to_string()),
                &[1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 13.0, 21.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "seqalloc_allocations_total",
        "Total number of committed counter increments"
    );
    describe_counter!(
        "seqalloc_identifiers_issued_total",
        "Total number of formatted identifiers issued, by kind"
    );
    describe_counter!(
        "seqalloc_conflicts_total",
        "Total number of allocation attempts rejected by a write conflict"
    );
    describe_counter!(
        "seqalloc_failures_total",
        "Total number of failed allocations, by reason"
    );
    describe_histogram!(
        "seqalloc_allocation_attempts",
        "Attempts needed per allocation, failed ones included"
    );
    describe_histogram!(
        "seqalloc_allocation_duration_seconds",
        "Time taken by an allocation, backoff included"
    );
}

/// Allocator metrics recorder.
pub struct AllocatorMetrics;

impl AllocatorMetrics {
    /// Record a committed allocation.
    pub fn record_allocation(attempts: u32, duration: Duration) {
        counter!("seqalloc_allocations_total").increment(1);
        histogram!("seqalloc_allocation_attempts").record(f64::from(attempts));
        histogram!("seqalloc_allocation_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an identifier issued for a kind.
    pub fn record_issued(kind: &'static str) {
        counter!("seqalloc_identifiers_issued_total", "kind" => kind).increment(1);
    }

    /// Record attempts lost to write conflicts.
    pub fn record_conflicts(count: u32) {
        if count > 0 {
            counter!("seqalloc_conflicts_total").increment(u64::from(count));
        }
    }

    /// Record a failed allocation.
    pub fn record_failure(reason: &'static str, attempts: u32, duration: Duration) {
        counter!("seqalloc_failures_total", "reason" => reason).increment(1);
        histogram!("seqalloc_allocation_attempts").record(f64::from(attempts));
        histogram!("seqalloc_allocation_duration_seconds").record(duration.as_secs_f64());
    }
}
