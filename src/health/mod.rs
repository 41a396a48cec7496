//! Provider health probing

pub mod models;
pub mod prober;

pub use models::{HealthCheckResult, HealthStatus};
pub use prober::{HealthConfig, HealthProber};
