//! Metrics collection and export for pelangi.
//!
//! Every crate records through the `metrics` facade using the names in
//! [`definitions`]. Recording is gated behind each crate's `metrics` feature;
//! when the `prometheus` feature is enabled here, [`init_metrics`] installs a
//! Prometheus recorder whose output can be rendered on demand.
//!
//! ```rust,ignore
//! use pelangi_metrics::{classifier, counter, labels};
//!
//! counter!(classifier::RESULTS_TOTAL, labels::TIER => "fuzzy-keyword").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
