//! Merger: verified + unverified offer lists into one provenance-tagged list.
//!
//! Fields that carry nothing for reconciliation are stripped here so the
//! pass-through copy on reconciled records never exposes them.

use serde_json::Value;

use crate::types::fields;
use crate::RawListing;

/// Wire fields removed from every listing before validation.
///
/// Marketing metadata, pending-rental counters, bandwidth already billed,
/// the derived total price and the API's own rented / bid flags.
pub const IRRELEVANT_FIELDS: &[&str] = &[
    "external",
    "webpage",
    "logo",
    "pending_count",
    "inet_down_billed",
    "inet_up_billed",
    "storage_total_cost",
    "dph_total",
    "rented",
    "is_bid",
];

/// Concatenate both collections (verified first), tag each listing with
/// `verified`, and strip [`IRRELEVANT_FIELDS`].
///
/// Relative order inside each input is preserved. A `verified` field already
/// present on a listing is overwritten by the provenance of its collection.
pub fn merge(verified: Vec<RawListing>, unverified: Vec<RawListing>) -> Vec<RawListing> {
    let mut out = Vec::with_capacity(verified.len() + unverified.len());
    out.extend(verified.into_iter().map(|l| tag(l, true)));
    out.extend(unverified.into_iter().map(|l| tag(l, false)));
    out
}

/// Remove every denylisted field from `listing` in place.
pub fn strip_irrelevant(listing: &mut RawListing) {
    for field in IRRELEVANT_FIELDS {
        listing.remove(*field);
    }
}

fn tag(mut listing: RawListing, verified: bool) -> RawListing {
    listing.insert(fields::VERIFIED.to_string(), Value::Bool(verified));
    strip_irrelevant(&mut listing);
    listing
}
