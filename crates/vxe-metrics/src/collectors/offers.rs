use std::collections::BTreeMap;

use prometheus::{Gauge, GaugeVec, Opts, Registry};
use vxe_offers::{PassReport, ReconciledRecord};

use super::register;
use crate::MetricsError;

const MACHINE_LABELS: &[&str] = &["machine_id", "gpu_name", "verified"];
const MODEL_LABELS: &[&str] = &["gpu_name", "verified"];

/// Reconciled marketplace capacity, per machine and per GPU model.
pub struct OfferMetrics {
    pub machine_num_gpus: GaugeVec,
    pub machine_num_gpus_rented: GaugeVec,
    pub machine_min_chunk: GaugeVec,
    pub machine_price_per_gpu: GaugeVec,

    pub machines: GaugeVec,
    pub gpus_total: GaugeVec,
    pub gpus_rented: GaugeVec,

    pub malformed: Gauge,
    pub machines_inconsistent: Gauge,
    pub machines_occupancy_missing: Gauge,
}

#[derive(Default)]
struct ModelTotals {
    machines: u64,
    gpus: u64,
    rented: u64,
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MetricsError> {
    register(registry, GaugeVec::new(Opts::new(name, help), labels)?)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, MetricsError> {
    register(registry, Gauge::with_opts(Opts::new(name, help))?)
}

impl OfferMetrics {
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        Ok(Self {
            machine_num_gpus: gauge_vec(
                registry,
                "offer_machine_num_gpus",
                "GPUs in a reconciled marketplace machine",
                MACHINE_LABELS,
            )?,
            machine_num_gpus_rented: gauge_vec(
                registry,
                "offer_machine_num_gpus_rented",
                "Rented GPUs in a reconciled marketplace machine",
                MACHINE_LABELS,
            )?,
            machine_min_chunk: gauge_vec(
                registry,
                "offer_machine_min_chunk",
                "Smallest number of GPUs the machine is offered in",
                MACHINE_LABELS,
            )?,
            machine_price_per_gpu: gauge_vec(
                registry,
                "offer_machine_price_per_gpu_dollars",
                "Base hourly price per GPU in dollars",
                MACHINE_LABELS,
            )?,
            machines: gauge_vec(
                registry,
                "offer_machines",
                "Reconciled marketplace machines per GPU model",
                MODEL_LABELS,
            )?,
            gpus_total: gauge_vec(
                registry,
                "offer_gpus_total",
                "GPUs on reconciled marketplace machines per GPU model",
                MODEL_LABELS,
            )?,
            gpus_rented: gauge_vec(
                registry,
                "offer_gpus_rented",
                "Rented GPUs on reconciled marketplace machines per GPU model",
                MODEL_LABELS,
            )?,
            malformed: gauge(
                registry,
                "offers_malformed",
                "Offers dropped in the last pass for missing or mistyped fields",
            )?,
            machines_inconsistent: gauge(
                registry,
                "offer_machines_inconsistent",
                "Machines skipped in the last pass because their chunks do not tile",
            )?,
            machines_occupancy_missing: gauge(
                registry,
                "offer_machines_occupancy_missing",
                "Machines in the last pass with offers lacking gpu_frac",
            )?,
        })
    }

    /// Replace every offer metric with the contents of `report`.
    pub fn record(&self, report: &PassReport) {
        for v in [
            &self.machine_num_gpus,
            &self.machine_num_gpus_rented,
            &self.machine_min_chunk,
            &self.machine_price_per_gpu,
            &self.machines,
            &self.gpus_total,
            &self.gpus_rented,
        ] {
            v.reset();
        }

        let mut per_model: BTreeMap<(&str, &'static str), ModelTotals> = BTreeMap::new();
        for r in &report.records {
            self.record_machine(r);

            let t = per_model
                .entry((r.gpu_name.as_str(), verified_label(r.verified)))
                .or_default();
            t.machines += 1;
            t.gpus += u64::from(r.num_gpus);
            t.rented += u64::from(r.num_gpus_rented);
        }

        for ((gpu_name, verified), t) in &per_model {
            let labels = [*gpu_name, *verified];
            self.machines.with_label_values(&labels).set(t.machines as f64);
            self.gpus_total.with_label_values(&labels).set(t.gpus as f64);
            self.gpus_rented.with_label_values(&labels).set(t.rented as f64);
        }

        self.malformed.set(report.malformed.len() as f64);
        self.machines_inconsistent
            .set(report.inconsistencies.len() as f64);
        self.machines_occupancy_missing
            .set(report.occupancy_missing.len() as f64);
    }

    fn record_machine(&self, r: &ReconciledRecord) {
        let machine_id = r.machine_id.to_string();
        let labels = [machine_id.as_str(), r.gpu_name.as_str(), verified_label(r.verified)];
        self.machine_num_gpus
            .with_label_values(&labels)
            .set(f64::from(r.num_gpus));
        self.machine_num_gpus_rented
            .with_label_values(&labels)
            .set(f64::from(r.num_gpus_rented));
        self.machine_min_chunk
            .with_label_values(&labels)
            .set(f64::from(r.min_chunk));
        self.machine_price_per_gpu
            .with_label_values(&labels)
            .set(r.price_per_gpu());
    }
}

fn verified_label(verified: bool) -> &'static str {
    if verified {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(machine_id: u64, gpu_name: &str, num_gpus: u32, rented: u32) -> ReconciledRecord {
        ReconciledRecord {
            machine_id,
            gpu_name: gpu_name.to_string(),
            num_gpus,
            dph_base: 0.5 * f64::from(num_gpus),
            verified: true,
            num_gpus_rented: rented,
            min_chunk: 1,
            extra: Map::new(),
        }
    }

    #[test]
    fn per_model_totals_sum_machines() {
        let registry = Registry::new();
        let m = OfferMetrics::new(&registry).unwrap();
        let report = PassReport {
            records: vec![
                record(1, "RTX 4090", 4, 1),
                record(2, "RTX 4090", 2, 2),
                record(3, "A100", 8, 0),
            ],
            ..PassReport::default()
        };
        m.record(&report);

        let l = ["RTX 4090", "true"];
        assert_eq!(m.machines.with_label_values(&l).get(), 2.0);
        assert_eq!(m.gpus_total.with_label_values(&l).get(), 6.0);
        assert_eq!(m.gpus_rented.with_label_values(&l).get(), 3.0);
        assert_eq!(
            m.machine_price_per_gpu
                .with_label_values(&["3", "A100", "true"])
                .get(),
            0.5
        );
    }

    #[test]
    fn vanished_machines_are_removed() {
        let registry = Registry::new();
        let m = OfferMetrics::new(&registry).unwrap();
        m.record(&PassReport {
            records: vec![record(1, "A40", 2, 0)],
            ..PassReport::default()
        });
        m.record(&PassReport::default());

        let families = registry.gather();
        let per_machine = families
            .iter()
            .find(|f| f.get_name() == "offer_machine_num_gpus");
        assert!(per_machine.map_or(true, |f| f.get_metric().is_empty()));
    }
}
