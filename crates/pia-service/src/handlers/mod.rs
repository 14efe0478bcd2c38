//! HTTP request handlers for PIA.

pub mod health;
pub mod metrics;
pub mod upload;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use upload::upload_sbom;
