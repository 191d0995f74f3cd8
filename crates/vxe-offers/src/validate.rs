//! Validator: raw schema-less listings into typed [`Listing`]s.
//!
//! A listing survives only if all five mandatory fields are present and
//! correctly typed. Every problem in a listing is collected into a single
//! [`MalformedListing`]; the listing is dropped and the pass continues.
//!
//! After validation the survivors are indexed by machine so machines whose
//! listings lack `gpu_frac` can be reported. That check never drops anything.

use serde_json::Value;
use tracing::warn;

use crate::group::index_by_machine;
use crate::types::fields;
use crate::{
    FieldIssue, FieldProblem, Listing, MachineId, MalformedListing, OccupancyDataMissing,
    RawListing, ValidationReport,
};

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(field: &'static str, expected: &'static str, got: &Value) -> FieldIssue {
    FieldIssue {
        field,
        problem: FieldProblem::WrongType {
            expected,
            got: json_type_name(got),
        },
    }
}

fn out_of_range(field: &'static str, raw: &Value) -> FieldIssue {
    FieldIssue {
        field,
        problem: FieldProblem::OutOfRange {
            raw: raw.to_string(),
        },
    }
}

fn read_number(raw: &RawListing, field: &'static str, issues: &mut Vec<FieldIssue>) -> Option<f64> {
    match raw.get(field) {
        None => {
            issues.push(FieldIssue {
                field,
                problem: FieldProblem::Missing,
            });
            None
        }
        Some(v @ Value::Number(_)) => {
            let n = v.as_f64();
            if n.is_none() {
                issues.push(out_of_range(field, v));
            }
            n
        }
        Some(other) => {
            issues.push(wrong_type(field, "number", other));
            None
        }
    }
}

/// Numbers arrive as JSON floats (`4.0`) or integers (`4`); both are accepted
/// as long as the value is integral and within `[min, max]`.
fn read_integral(
    raw: &RawListing,
    field: &'static str,
    min: u64,
    max: u64,
    issues: &mut Vec<FieldIssue>,
) -> Option<u64> {
    let n = read_number(raw, field, issues)?;
    let in_range = n.fract() == 0.0 && n >= min as f64 && n <= max as f64;
    if !in_range {
        if let Some(v) = raw.get(field) {
            issues.push(out_of_range(field, v));
        }
        return None;
    }
    // Exact integers beyond f64 precision still come through as u64.
    Some(raw.get(field).and_then(Value::as_u64).unwrap_or(n as u64))
}

fn read_string(
    raw: &RawListing,
    field: &'static str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    match raw.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            issues.push(wrong_type(field, "string", other));
            None
        }
        None => {
            issues.push(FieldIssue {
                field,
                problem: FieldProblem::Missing,
            });
            None
        }
    }
}

fn read_bool(raw: &RawListing, field: &'static str, issues: &mut Vec<FieldIssue>) -> Option<bool> {
    match raw.get(field) {
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            issues.push(wrong_type(field, "bool", other));
            None
        }
        None => {
            issues.push(FieldIssue {
                field,
                problem: FieldProblem::Missing,
            });
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Convert one raw listing into a typed [`Listing`].
///
/// # Errors
/// Returns a [`MalformedListing`] carrying every field problem found and the
/// record as received.
pub fn validate_listing(raw: RawListing) -> Result<Listing, MalformedListing> {
    let mut issues = Vec::new();

    let machine_id = read_integral(&raw, fields::MACHINE_ID, 0, u64::MAX, &mut issues);
    let gpu_name = read_string(&raw, fields::GPU_NAME, &mut issues);
    let num_gpus = read_integral(&raw, fields::NUM_GPUS, 1, u64::from(u32::MAX), &mut issues);
    let dph_base = read_number(&raw, fields::DPH_BASE, &mut issues);
    let rentable = read_bool(&raw, fields::RENTABLE, &mut issues);

    let (Some(machine_id), Some(gpu_name), Some(num_gpus), Some(dph_base), Some(rentable)) =
        (machine_id, gpu_name, num_gpus, dph_base, rentable)
    else {
        return Err(MalformedListing {
            issues,
            record: raw,
        });
    };

    let gpu_frac = raw.get(fields::GPU_FRAC).and_then(Value::as_f64);
    let verified = raw
        .get(fields::VERIFIED)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut extra = raw;
    for field in fields::TYPED {
        extra.remove(*field);
    }

    Ok(Listing {
        machine_id: machine_id as MachineId,
        gpu_name,
        // read_integral bounded it to u32::MAX.
        num_gpus: num_gpus as u32,
        dph_base,
        rentable,
        gpu_frac,
        verified,
        extra,
    })
}

/// Validate every listing, logging each drop and each machine with missing
/// occupancy data.
///
/// Survivors keep their relative input order.
pub fn validate_report(raw: Vec<RawListing>) -> ValidationReport {
    let mut listings = Vec::with_capacity(raw.len());
    let mut malformed = Vec::new();

    for record in raw {
        match validate_listing(record) {
            Ok(listing) => listings.push(listing),
            Err(err) => {
                let record = Value::Object(err.record.clone());
                warn!(record = %record, "{err}");
                malformed.push(err);
            }
        }
    }

    let occupancy_missing = find_missing_occupancy(&listings);
    for m in &occupancy_missing {
        warn!(
            machine_id = m.machine_id,
            listings_without_frac = m.listings_without_frac,
            "offer list inconsistency: machine {} has offers with gpu_frac=null",
            m.machine_id
        );
    }

    ValidationReport {
        listings,
        malformed,
        occupancy_missing,
    }
}

/// Validate and keep only the surviving listings.
pub fn validate(raw: Vec<RawListing>) -> Vec<Listing> {
    validate_report(raw).listings
}

fn find_missing_occupancy(listings: &[Listing]) -> Vec<OccupancyDataMissing> {
    index_by_machine(listings)
        .into_iter()
        .filter_map(|(machine_id, members)| {
            let without = members.iter().filter(|l| l.gpu_frac.is_none()).count();
            (without > 0).then_some(OccupancyDataMissing {
                machine_id,
                listings_without_frac: without,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
