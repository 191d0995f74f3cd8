use prometheus::{Encoder, Gauge, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::debug;
use vxe_fetch::{Earnings, MachineInfo};
use vxe_offers::PassReport;

use crate::collectors::{register, EarningsMetrics, MachineMetrics, OfferMetrics};
use crate::MetricsError;

/// Every exported name starts with this prefix.
pub const DEFAULT_PREFIX: &str = "vastai";

/// Content type of [`ExporterMetrics::export`].
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registry plus every metric family the exporter publishes.
///
/// Built once at startup and shared behind an `Arc`; the prometheus types
/// are internally synchronized, so updates take `&self`.
pub struct ExporterMetrics {
    registry: Registry,
    pub offers: OfferMetrics,
    pub machines: MachineMetrics,
    pub earnings: EarningsMetrics,
    pub update_errors: IntCounterVec,
    pub last_update: Gauge,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new_custom(Some(prefix.to_string()), None)?;

        let offers = OfferMetrics::new(&registry)?;
        let machines = MachineMetrics::new(&registry)?;
        let earnings = EarningsMetrics::new(&registry)?;
        let update_errors = register(
            &registry,
            IntCounterVec::new(
                Opts::new("update_errors_total", "Failed upstream fetches by endpoint"),
                &["endpoint"],
            )?,
        )?;
        let last_update = register(
            &registry,
            Gauge::with_opts(Opts::new(
                "last_update_timestamp_seconds",
                "Unix time of the last update with at least one successful fetch",
            ))?,
        )?;

        Ok(Self {
            registry,
            offers,
            machines,
            earnings,
            update_errors,
            last_update,
        })
    }

    /// Expose a zero error counter for each endpoint before any failure.
    pub fn init_endpoints(&self, endpoints: &[&str]) {
        for e in endpoints {
            self.update_errors.with_label_values(&[*e]);
        }
    }

    pub fn record_offers(&self, report: &PassReport) {
        self.offers.record(report);
        debug!(records = report.records.len(), "offer metrics updated");
    }

    pub fn record_machines(&self, machines: &[MachineInfo]) {
        self.machines.record(machines);
    }

    pub fn record_earnings(&self, earnings: &Earnings) {
        self.earnings.record(earnings);
    }

    pub fn record_update_error(&self, endpoint: &str) {
        self.update_errors.with_label_values(&[endpoint]).inc();
    }

    pub fn mark_updated(&self, unix_secs: f64) {
        self.last_update.set(unix_secs);
    }

    /// Prometheus text exposition of every registered family.
    pub fn export(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }
}
