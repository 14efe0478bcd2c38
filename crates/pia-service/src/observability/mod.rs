//! Observability module for PIA.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
