//! Shared runtime state for vxe-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The update task is the
//! only writer of [`UpdateStatus`]; handlers only read it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;
use vxe_fetch::{Endpoint, MarketplaceSource};
use vxe_metrics::ExporterMetrics;

use crate::updater::run_update;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// UpdateStatus
// ---------------------------------------------------------------------------

/// Counts from the last offer reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferPassSummary {
    pub listings_in: usize,
    pub listings_valid: usize,
    pub machines: usize,
    pub records: usize,
    pub malformed: usize,
    pub occupancy_missing: usize,
    pub inconsistent: usize,
}

/// Health of one upstream endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub errors_total: u64,
}

/// What the update task has done so far. Returned by GET /v1/status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Marketplace the passes pull from; `None` before the first pass.
    pub source: Option<String>,
    pub passes_total: u64,
    pub last_pass_id: Option<Uuid>,
    pub last_pass_at: Option<DateTime<Utc>>,
    /// `None` until an offer fetch has succeeded.
    pub offers: Option<OfferPassSummary>,
    pub machines_total: Option<usize>,
    /// Keyed by endpoint label (`bundles`, `machines`, `machine-earnings`).
    pub endpoints: BTreeMap<String, EndpointStatus>,
}

impl UpdateStatus {
    pub fn record_success(&mut self, endpoint: Endpoint, at: DateTime<Utc>) {
        let e = self.endpoints.entry(endpoint.as_str().to_string()).or_default();
        e.last_success_at = Some(at);
        e.last_error = None;
    }

    pub fn record_error(&mut self, endpoint: Endpoint, at: DateTime<Utc>, message: String) {
        let e = self.endpoints.entry(endpoint.as_str().to_string()).or_default();
        e.last_error = Some(message);
        e.last_error_at = Some(at);
        e.errors_total += 1;
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and the update task.
#[derive(Clone)]
pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    /// Exported metric families.
    pub metrics: Arc<ExporterMetrics>,
    /// Progress of the update task.
    pub status: Arc<RwLock<UpdateStatus>>,
    pub update_interval: Duration,
    /// Set once at construction; uptime counts from here.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(metrics: Arc<ExporterMetrics>, update_interval: Duration) -> Self {
        let labels: Vec<&str> = Endpoint::ALL.iter().map(Endpoint::as_str).collect();
        metrics.init_endpoints(&labels);

        Self {
            build: BuildInfo {
                service: "vxe-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            metrics,
            status: Arc::new(RwLock::new(UpdateStatus::default())),
            update_interval,
            started_at: Instant::now(),
        }
    }

    /// Whole seconds since this state was built at boot.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn the background task that runs one update pass per `interval`.
///
/// The first pass runs immediately. A pass that overruns the interval makes
/// the ticker skip the missed ticks, so passes never overlap or burst.
pub fn spawn_update_loop(
    state: Arc<AppState>,
    source: Arc<dyn MarketplaceSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_update(&state, source.as_ref()).await;
        }
    })
}
