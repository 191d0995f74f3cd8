//! Pass driver: merge, validate, group and reconcile one fresh snapshot.

use tracing::info;

use crate::engine::reconcile_report;
use crate::group::group_by_machine;
use crate::merge::merge;
use crate::validate::validate_report;
use crate::{PassReport, RawListing};

/// Run one reconciliation pass over a fresh snapshot:
/// merge, validate, group, reconcile.
///
/// Never fails. Every dropped listing and skipped machine is returned in the
/// report alongside the records, which are in machine-id order.
pub fn run_pass(verified: Vec<RawListing>, unverified: Vec<RawListing>) -> PassReport {
    let merged = merge(verified, unverified);
    let listings_in = merged.len();

    let validation = validate_report(merged);
    let listings_valid = validation.listings.len();

    let groups = group_by_machine(validation.listings);
    let machines = groups.len();

    let reconciled = reconcile_report(&groups);

    info!(
        listings_in,
        listings_valid,
        machines,
        records = reconciled.records.len(),
        malformed = validation.malformed.len(),
        occupancy_missing = validation.occupancy_missing.len(),
        inconsistent = reconciled.inconsistencies.len(),
        "offer reconciliation pass complete"
    );

    PassReport {
        listings_in,
        listings_valid,
        machines,
        records: reconciled.records,
        malformed: validation.malformed,
        occupancy_missing: validation.occupancy_missing,
        inconsistencies: reconciled.inconsistencies,
    }
}
