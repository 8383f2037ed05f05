//! Observability for Identity Guard.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
