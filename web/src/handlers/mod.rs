//! HTTP request handlers.

pub mod allocation;
pub mod health;
pub mod metrics;

pub use allocation::{
    allocate_admin_id, allocate_booking_id, allocate_driver_id, allocate_passenger_id,
};
pub use health::{health_check, readiness_check};
pub use metrics::render_metrics;
