//! Utility Functions
//!
//! Delivery metrics and user-friendly error formatting.
//!
//! ## Metrics
//!
//! The [`metrics`] module keeps counters and histograms that
//! [`StatsObserver`](crate::input::StatsObserver) and
//! [`TracingReport`](crate::input::TracingReport) feed:
//!
//! ```rust
//! use lamco_input_sender::utils::{metric_names, MetricsCollector};
//!
//! let metrics = MetricsCollector::new();
//! metrics.increment_counter(metric_names::EVENTS_CONSUMED, 1);
//!
//! println!("{}", metrics.export_prometheus());
//! ```
//!
//! ## Error Formatting
//!
//! The [`errors`] module renders the error that ends the binary with
//! context-specific troubleshooting steps:
//!
//! - Routing errors → unknown or stale channel ids
//! - Transport errors → OS error code and common causes
//! - Config errors → syntax and value ranges
//! - Socket errors → fd limits

pub mod errors;
pub mod metrics;

pub use errors::format_user_error;
pub use metrics::{metric_names, HistogramStats, MetricsCollector, MetricsSnapshot, Timer};
