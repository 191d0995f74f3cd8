//! vxe-metrics
//!
//! Prometheus metrics for the exporter. All descriptors are created and
//! registered once in [`ExporterMetrics::new`]; updates only set values.
//! Label-vector gauges are reset on every update so machines that vanished
//! from the marketplace stop being exported.

pub mod collectors;
mod error;
mod registry;

pub use error::MetricsError;
pub use registry::{ExporterMetrics, DEFAULT_PREFIX, TEXT_CONTENT_TYPE};
