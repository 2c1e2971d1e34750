//! HTTP surface
//!
//! Only operational endpoints: Prometheus metrics and a health probe. Served
//! when `metrics.enabled` is set.

mod metrics;

pub use metrics::metrics_router;
