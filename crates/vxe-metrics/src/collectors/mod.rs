//! Metric families grouped by the upstream data they describe.

mod account;
mod offers;

pub use account::{EarningsMetrics, MachineMetrics};
pub use offers::OfferMetrics;

use prometheus::core::Collector;
use prometheus::Registry;

use crate::MetricsError;

/// Register `collector` and hand it back for updates.
pub(crate) fn register<C>(registry: &Registry, collector: C) -> Result<C, MetricsError>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}
