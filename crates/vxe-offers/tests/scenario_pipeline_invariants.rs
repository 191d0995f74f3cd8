use std::collections::BTreeSet;

use serde_json::{json, Value};
use vxe_offers::*;

fn raw(v: Value) -> RawListing {
    v.as_object().cloned().unwrap()
}

/// A noisy snapshot: good machines, broken machines and garbage listings.
fn noisy_snapshot() -> Vec<RawListing> {
    vec![
        raw(json!({"machine_id": 10, "gpu_name": "A100", "num_gpus": 1, "dph_base": 1.1, "rentable": true, "gpu_frac": 0.0})),
        raw(json!({"machine_id": 10, "gpu_name": "A100", "num_gpus": 1, "dph_base": 1.1, "rentable": false, "gpu_frac": 1.0})),
        raw(json!({"machine_id": 10, "gpu_name": "A100", "num_gpus": 2, "dph_base": 2.2, "rentable": false, "gpu_frac": 0.5})),
        raw(json!({"machine_id": 20, "gpu_name": "A100", "num_gpus": 2, "dph_base": 2.2, "rentable": true})),
        raw(json!({"machine_id": 20, "gpu_name": "A100", "num_gpus": 2, "dph_base": 2.2, "rentable": true})),
        raw(json!({"machine_id": 30, "gpu_name": null, "num_gpus": 1, "dph_base": 1.0, "rentable": true})),
        raw(json!({"machine_id": 40.5, "gpu_name": "A10", "num_gpus": 1, "dph_base": 0.2, "rentable": true})),
        raw(json!({"machine_id": 50, "gpu_name": "A10", "num_gpus": 0, "dph_base": 0.2, "rentable": true})),
        raw(json!({"machine_id": 60, "gpu_name": "A10", "num_gpus": 3, "dph_base": 0.6, "rentable": "yes"})),
        raw(json!({})),
    ]
}

#[test]
fn merge_tags_provenance_and_strips_denylist() {
    let mut verified = noisy_snapshot();
    for l in &mut verified {
        l.insert("logo".into(), json!("x.png"));
        l.insert("is_bid".into(), json!(false));
    }
    let unverified = vec![raw(json!({"machine_id": 1, "verified": true, "rented": true}))];
    let n_verified = verified.len();

    let merged = merge(verified, unverified);
    assert_eq!(merged.len(), n_verified + 1);
    for (i, l) in merged.iter().enumerate() {
        assert_eq!(l["verified"], json!(i < n_verified));
        for field in IRRELEVANT_FIELDS {
            assert!(!l.contains_key(*field));
        }
    }
}

#[test]
fn validator_is_total_and_survivors_are_well_typed() {
    let input = noisy_snapshot();
    let report = validate_report(input.clone());

    assert_eq!(report.listings.len() + report.malformed.len(), input.len());
    assert_eq!(report.listings.len(), 5);
    for l in &report.listings {
        assert!(l.num_gpus >= 1);
        assert!(!l.gpu_name.is_empty());
    }
    for m in &report.malformed {
        assert!(!m.issues.is_empty());
        assert!(input.contains(&m.record));
    }
    // Machine 20 has no gpu_frac anywhere; flagged but kept.
    assert_eq!(report.occupancy_missing.len(), 1);
    assert_eq!(report.occupancy_missing[0].machine_id, 20);
    assert_eq!(report.occupancy_missing[0].listings_without_frac, 2);
}

#[test]
fn grouping_is_an_exact_partition() {
    let listings = validate(noisy_snapshot());
    let n = listings.len();
    let groups = group_by_machine(listings);

    let grouped: usize = groups.values().map(Vec::len).sum();
    assert_eq!(grouped, n);
    for (id, members) in &groups {
        assert!(!members.is_empty());
        assert!(members.iter().all(|l| l.machine_id == *id));
    }
    let ids: BTreeSet<u64> = groups.keys().copied().collect();
    assert_eq!(ids, BTreeSet::from([10, 20]));
}

#[test]
fn every_record_satisfies_the_tiling_invariant() {
    let listings = validate(noisy_snapshot());
    let groups = group_by_machine(listings);
    let report = reconcile_report(&groups);

    for r in &report.records {
        let members = &groups[&r.machine_id];
        let max = members.iter().map(|l| l.num_gpus).max().unwrap();
        let min = members.iter().map(|l| l.num_gpus).min().unwrap();
        assert_eq!(members.iter().filter(|l| l.num_gpus == max).count(), 1);
        let tiled: u32 = members
            .iter()
            .filter(|l| l.num_gpus == min)
            .map(|l| l.num_gpus)
            .sum();
        assert_eq!(tiled, r.num_gpus);
        assert_eq!(r.min_chunk, min);
        assert!(r.num_gpus_rented <= r.num_gpus);
    }

    let ids: Vec<u64> = report.records.iter().map(|r| r.machine_id).collect();
    assert_eq!(ids, vec![10]);
    assert_eq!(report.records[0].num_gpus_rented, 1);
    assert_eq!(report.inconsistencies.len(), 1);
    assert_eq!(report.inconsistencies[0].machine_id, 20);
    assert_eq!(report.inconsistencies[0].chunks, vec![2, 2]);
}

#[test]
fn passes_are_independent() {
    let first = run_pass(noisy_snapshot(), vec![]);
    let second = run_pass(noisy_snapshot(), vec![]);
    assert_eq!(first.records, second.records);
    assert_eq!(first.inconsistencies, second.inconsistencies);
}
