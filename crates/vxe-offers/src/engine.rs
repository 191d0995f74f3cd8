//! Whole-machine reconciler: one canonical record per machine group.
//!
//! A machine's smallest chunk listings must tile its single largest listing
//! exactly. Machines that do not tile are reported as [`ChunkInconsistency`]
//! and left out of the output.

use tracing::warn;

use crate::types::fields;
use crate::{ChunkInconsistency, Listing, MachineGroup, MachineId, ReconcileReport, ReconciledRecord};

/// Fields of the whole-machine listing that describe one chunk rather than
/// the machine, and so are not carried onto the reconciled record.
pub const RECONCILE_DROPPED_FIELDS: &[&str] = &[
    fields::GPU_FRAC,
    fields::RENTABLE,
    fields::BUNDLE_ID,
    fields::CPU_CORES_EFFECTIVE,
];

/// Reconcile the listings of one machine.
///
/// The machine is consistent iff exactly one listing has the largest chunk
/// size and the smallest chunks add up to it. Occupancy is counted on the
/// smallest chunks: a non-rentable chunk is a rented one.
///
/// # Errors
/// [`ChunkInconsistency`] with every observed chunk size when the tiling
/// does not hold (including an empty group).
pub fn reconcile_machine(
    machine_id: MachineId,
    listings: &[Listing],
) -> Result<ReconciledRecord, ChunkInconsistency> {
    let mut chunks: Vec<u32> = listings.iter().map(|l| l.num_gpus).collect();
    chunks.sort_unstable();

    let (Some(&min_chunk), Some(&max_chunk)) = (chunks.first(), chunks.last()) else {
        return Err(ChunkInconsistency {
            machine_id,
            chunks,
            whole_machine_candidates: 0,
            min_chunk_total: 0,
        });
    };

    let mut total_gpus: u64 = 0;
    let mut used_gpus: u64 = 0;
    for l in listings.iter().filter(|l| l.num_gpus == min_chunk) {
        total_gpus += u64::from(l.num_gpus);
        if !l.rentable {
            used_gpus += u64::from(l.num_gpus);
        }
    }

    let candidates: Vec<&Listing> = listings
        .iter()
        .filter(|l| l.num_gpus == max_chunk)
        .collect();

    let whole = match candidates.as_slice() {
        [only] if u64::from(only.num_gpus) == total_gpus => *only,
        _ => {
            return Err(ChunkInconsistency {
                machine_id,
                chunks,
                whole_machine_candidates: candidates.len(),
                min_chunk_total: total_gpus,
            })
        }
    };

    let mut extra = whole.extra.clone();
    for field in RECONCILE_DROPPED_FIELDS
        .iter()
        .chain(&[fields::NUM_GPUS_RENTED, fields::MIN_CHUNK])
    {
        extra.remove(*field);
    }

    Ok(ReconciledRecord {
        machine_id,
        gpu_name: whole.gpu_name.clone(),
        num_gpus: whole.num_gpus,
        dph_base: whole.dph_base,
        verified: whole.verified,
        // used_gpus <= total_gpus == whole.num_gpus, a u32.
        num_gpus_rented: used_gpus as u32,
        min_chunk,
        extra,
    })
}

/// Reconcile every machine group independently.
///
/// Records come out in machine-id order. An inconsistent machine is logged
/// and skipped; it never affects the others.
pub fn reconcile_report(groups: &MachineGroup) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for (machine_id, listings) in groups {
        match reconcile_machine(*machine_id, listings) {
            Ok(record) => report.records.push(record),
            Err(err) => {
                warn!(
                    machine_id = err.machine_id,
                    chunks = ?err.chunks,
                    whole_machine_candidates = err.whole_machine_candidates,
                    min_chunk_total = err.min_chunk_total,
                    "offer list inconsistency: {err}"
                );
                report.inconsistencies.push(err);
            }
        }
    }

    report
}

/// Reconcile and keep only the records.
pub fn reconcile(groups: &MachineGroup) -> Vec<ReconciledRecord> {
    reconcile_report(groups).records
}
