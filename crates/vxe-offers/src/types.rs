use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Marketplace machine identifier.
pub type MachineId = u64;

/// One offer exactly as the marketplace API returned it.
///
/// The API is schema-less; every field is a dynamically typed JSON value.
/// Nothing downstream of the validator reads a `RawListing`.
pub type RawListing = Map<String, Value>;

/// Validated listings partitioned by machine id.
///
/// Ordered by machine id so logs and reconciled output are deterministic.
pub type MachineGroup = BTreeMap<MachineId, Vec<Listing>>;

/// Wire field names the engine reads or writes.
pub mod fields {
    pub const MACHINE_ID: &str = "machine_id";
    pub const GPU_NAME: &str = "gpu_name";
    /// Chunk size: number of GPUs bundled in the offer.
    pub const NUM_GPUS: &str = "num_gpus";
    /// Hourly base price in dollars for the whole chunk.
    pub const DPH_BASE: &str = "dph_base";
    pub const RENTABLE: &str = "rentable";
    /// Occupied fraction. The API sometimes sends `null` here.
    pub const GPU_FRAC: &str = "gpu_frac";
    /// Provenance tag written by the merger.
    pub const VERIFIED: &str = "verified";
    pub const BUNDLE_ID: &str = "bundle_id";
    pub const CPU_CORES_EFFECTIVE: &str = "cpu_cores_effective";

    // Derived by the reconciler.
    pub const NUM_GPUS_RENTED: &str = "num_gpus_rented";
    pub const MIN_CHUNK: &str = "min_chunk";

    /// Fields lifted into typed [`crate::Listing`] members.
    pub const TYPED: &[&str] = &[
        MACHINE_ID, GPU_NAME, NUM_GPUS, DPH_BASE, RENTABLE, GPU_FRAC, VERIFIED,
    ];
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A listing that passed validation.
///
/// Mandatory fields are typed; everything else the API sent is carried in
/// `extra` untouched so it can be passed through to the reconciled record.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub machine_id: MachineId,
    pub gpu_name: String,
    /// Chunk size, always >= 1.
    pub num_gpus: u32,
    pub dph_base: f64,
    pub rentable: bool,
    /// `None` when the API omitted the field or sent a non-number.
    pub gpu_frac: Option<f64>,
    /// Provenance tag. Listings that never went through the merger read as unverified.
    pub verified: bool,
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Reconciled record
// ---------------------------------------------------------------------------

/// Canonical whole-machine capacity record, one per consistent machine.
///
/// Serializes as a flat field-to-value map: the pass-through fields of the
/// whole-machine listing plus the typed and derived fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciledRecord {
    pub machine_id: MachineId,
    pub gpu_name: String,
    /// Whole-machine chunk size, i.e. the machine's GPU count.
    pub num_gpus: u32,
    pub dph_base: f64,
    pub verified: bool,
    /// GPUs currently occupied, summed over the finest-granularity listings.
    pub num_gpus_rented: u32,
    /// Finest chunk granularity the machine is offered at.
    pub min_chunk: u32,
    pub extra: Map<String, Value>,
}

impl ReconciledRecord {
    /// Hourly price per GPU in dollars.
    pub fn price_per_gpu(&self) -> f64 {
        self.dph_base / f64::from(self.num_gpus)
    }

    pub fn num_gpus_idle(&self) -> u32 {
        self.num_gpus.saturating_sub(self.num_gpus_rented)
    }

    /// Flatten into the field-to-value mapping handed to the metrics emitter.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut out = self.extra.clone();
        out.insert(fields::MACHINE_ID.into(), self.machine_id.into());
        out.insert(fields::GPU_NAME.into(), self.gpu_name.clone().into());
        out.insert(fields::NUM_GPUS.into(), self.num_gpus.into());
        out.insert(fields::DPH_BASE.into(), self.dph_base.into());
        out.insert(fields::VERIFIED.into(), self.verified.into());
        out.insert(fields::NUM_GPUS_RENTED.into(), self.num_gpus_rented.into());
        out.insert(fields::MIN_CHUNK.into(), self.min_chunk.into());
        out
    }
}

impl Serialize for ReconciledRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_fields().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// What is wrong with one mandatory field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    WrongType {
        expected: &'static str,
        got: &'static str,
    },
    /// Right JSON type, unusable value (fractional id, zero chunk, ...).
    OutOfRange { raw: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            FieldProblem::Missing => write!(f, "{} missing", self.field),
            FieldProblem::WrongType { expected, got } => {
                write!(f, "{} expected {expected}, got {got}", self.field)
            }
            FieldProblem::OutOfRange { raw } => {
                write!(f, "{} out of range: {raw}", self.field)
            }
        }
    }
}

/// A listing dropped by the validator, with every problem found in it.
#[derive(Clone, Debug, PartialEq)]
pub struct MalformedListing {
    pub issues: Vec<FieldIssue>,
    /// The offending record as received (after merge).
    pub record: RawListing,
}

impl fmt::Display for MalformedListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer is missing required fields:")?;
        for (i, issue) in self.issues.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MalformedListing {}

/// A machine with at least one listing lacking a numeric `gpu_frac`.
/// Diagnostic only; the listings are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyDataMissing {
    pub machine_id: MachineId,
    pub listings_without_frac: usize,
}

/// A machine whose chunk listings do not tile into one whole-machine listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInconsistency {
    pub machine_id: MachineId,
    /// Every observed chunk size, ascending.
    pub chunks: Vec<u32>,
    /// Number of listings at the maximum chunk size.
    pub whole_machine_candidates: usize,
    /// Sum of the minimum-size chunks.
    pub min_chunk_total: u64,
}

impl fmt::Display for ChunkInconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "machine {} has invalid chunk split {:?}",
            self.machine_id, self.chunks
        )
    }
}

impl std::error::Error for ChunkInconsistency {}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Validator output plus everything it dropped or flagged.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    pub listings: Vec<Listing>,
    pub malformed: Vec<MalformedListing>,
    pub occupancy_missing: Vec<OccupancyDataMissing>,
}

/// Reconciler output: records in machine-id order plus the skipped machines.
#[derive(Clone, Debug, Default)]
pub struct ReconcileReport {
    pub records: Vec<ReconciledRecord>,
    pub inconsistencies: Vec<ChunkInconsistency>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

/// Everything one reconciliation pass produced.
#[derive(Clone, Debug, Default)]
pub struct PassReport {
    /// Listings after merge, before validation.
    pub listings_in: usize,
    pub listings_valid: usize,
    /// Distinct machines among the valid listings.
    pub machines: usize,
    pub records: Vec<ReconciledRecord>,
    pub malformed: Vec<MalformedListing>,
    pub occupancy_missing: Vec<OccupancyDataMissing>,
    pub inconsistencies: Vec<ChunkInconsistency>,
}
