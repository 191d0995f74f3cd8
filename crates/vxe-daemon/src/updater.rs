//! One update pass: fetch every endpoint, reconcile offers, refresh metrics.
//!
//! Endpoints are independent. A failed fetch is logged, counted and recorded
//! in status; the metric families it feeds keep their previous values.

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;
use vxe_fetch::{Endpoint, FetchError, MarketplaceSource};
use vxe_offers::run_pass;

use crate::state::{AppState, OfferPassSummary, UpdateStatus};

/// What one pass achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub pass_id: Uuid,
    pub succeeded: Vec<Endpoint>,
    pub failed: Vec<Endpoint>,
}

impl UpdateOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub async fn run_update(state: &AppState, source: &dyn MarketplaceSource) -> UpdateOutcome {
    let pass_id = Uuid::new_v4();

    let offers = source.fetch_offers().await.map(|snapshot| {
        let report = run_pass(snapshot.verified, snapshot.unverified);
        state.metrics.record_offers(&report);
        OfferPassSummary {
            listings_in: report.listings_in,
            listings_valid: report.listings_valid,
            machines: report.machines,
            records: report.records.len(),
            malformed: report.malformed.len(),
            occupancy_missing: report.occupancy_missing.len(),
            inconsistent: report.inconsistencies.len(),
        }
    });

    let machines = source.fetch_machines().await.map(|machines| {
        state.metrics.record_machines(&machines);
        machines.len()
    });

    let earnings = source
        .fetch_earnings()
        .await
        .map(|earnings| state.metrics.record_earnings(&earnings));

    let now = Utc::now();
    let mut outcome = UpdateOutcome {
        pass_id,
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    {
        let mut st = state.status.write().await;
        st.source = Some(source.source_name().to_string());
        st.passes_total += 1;
        st.last_pass_id = Some(pass_id);
        st.last_pass_at = Some(now);

        let mut settle = |endpoint: Endpoint, err: Option<&FetchError>| {
            settle_endpoint(state, &mut st, &mut outcome, pass_id, now, endpoint, err)
        };
        settle(Endpoint::Offers, offers.as_ref().err());
        settle(Endpoint::Machines, machines.as_ref().err());
        settle(Endpoint::Earnings, earnings.as_ref().err());

        if let Ok(summary) = offers {
            st.offers = Some(summary);
        }
        if let Ok(n) = machines {
            st.machines_total = Some(n);
        }
    }

    if !outcome.succeeded.is_empty() {
        state.metrics.mark_updated(now.timestamp() as f64);
    }

    info!(
        pass_id = %pass_id,
        source = source.source_name(),
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "update pass complete"
    );
    outcome
}

fn settle_endpoint(
    state: &AppState,
    status: &mut UpdateStatus,
    outcome: &mut UpdateOutcome,
    pass_id: Uuid,
    at: DateTime<Utc>,
    endpoint: Endpoint,
    err: Option<&FetchError>,
) {
    match err {
        None => {
            status.record_success(endpoint, at);
            outcome.succeeded.push(endpoint);
        }
        Some(e) => {
            error!(pass_id = %pass_id, endpoint = %endpoint, error = %e, "marketplace fetch failed");
            state.metrics.record_update_error(endpoint.as_str());
            status.record_error(endpoint, at, e.to_string());
            outcome.failed.push(endpoint);
        }
    }
}
