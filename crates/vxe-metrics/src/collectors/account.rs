use prometheus::{Gauge, GaugeVec, Opts, Registry};
use vxe_fetch::{Earnings, MachineInfo};

use super::register;
use crate::MetricsError;

const HOST_LABELS: &[&str] = &["machine_id", "hostname"];

/// The account's own machines.
pub struct MachineMetrics {
    pub machines_total: Gauge,
    pub num_gpus: GaugeVec,
    pub total_flops: GaugeVec,
    pub gpu_ram: GaugeVec,
    pub cpu_ram: GaugeVec,
    pub cpu_cores: GaugeVec,
}

impl MachineMetrics {
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        let per_host = |name: &str, help: &str| -> Result<GaugeVec, MetricsError> {
            register(registry, GaugeVec::new(Opts::new(name, help), HOST_LABELS)?)
        };
        Ok(Self {
            machines_total: register(
                registry,
                Gauge::with_opts(Opts::new("machines_total", "Total number of machines."))?,
            )?,
            num_gpus: per_host("machine_num_gpus", "Number of GPUs in a machine.")?,
            total_flops: per_host("machine_total_flops", "Total FLOPs of a machine.")?,
            gpu_ram: per_host("machine_gpu_ram", "GPU RAM of a machine.")?,
            cpu_ram: per_host("machine_cpu_ram", "CPU RAM of a machine.")?,
            cpu_cores: per_host("machine_cpu_cores", "Number of CPU cores in a machine.")?,
        })
    }

    pub fn record(&self, machines: &[MachineInfo]) {
        for v in [
            &self.num_gpus,
            &self.total_flops,
            &self.gpu_ram,
            &self.cpu_ram,
            &self.cpu_cores,
        ] {
            v.reset();
        }

        self.machines_total.set(machines.len() as f64);
        for m in machines {
            let machine_id = m.machine_id.to_string();
            let labels = [machine_id.as_str(), m.hostname.as_str()];
            self.num_gpus.with_label_values(&labels).set(m.num_gpus);
            self.total_flops.with_label_values(&labels).set(m.total_flops);
            self.gpu_ram.with_label_values(&labels).set(m.gpu_ram);
            self.cpu_ram.with_label_values(&labels).set(m.cpu_ram);
            self.cpu_cores.with_label_values(&labels).set(m.cpu_cores);
        }
    }
}

/// Account earnings.
pub struct EarningsMetrics {
    pub current_balance: Gauge,
    pub current_service_fee: Gauge,
    pub total_gpu: Gauge,
}

impl EarningsMetrics {
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        let gauge = |name: &str, help: &str| -> Result<Gauge, MetricsError> {
            register(registry, Gauge::with_opts(Opts::new(name, help))?)
        };
        Ok(Self {
            current_balance: gauge("earnings_current_balance", "Current account balance.")?,
            current_service_fee: gauge(
                "earnings_current_service_fee",
                "Current service fee.",
            )?,
            total_gpu: gauge("earnings_total_gpu", "Total GPU earnings.")?,
        })
    }

    pub fn record(&self, earnings: &Earnings) {
        self.current_balance.set(earnings.current_balance);
        self.current_service_fee.set(earnings.current_service_fee);
        self.total_gpu.set(earnings.total_gpu);
    }
}
