//! Observability
//!
//! In-process counters for each worker replica.

pub mod metrics;
