//! # Observability
//!
//! Prometheus metrics collection. Logging goes through `tracing`, configured
//! at start-up.

pub mod metrics;

pub use metrics::*;
