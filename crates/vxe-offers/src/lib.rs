//! vxe-offers
//!
//! Offer reconciliation engine for the Vast.ai marketplace exporter.
//!
//! The marketplace lists each machine once per chunk size it can be rented
//! in. One pass turns those loosely typed chunk listings into one canonical
//! whole-machine record per machine with its rented/idle split:
//!
//! - Merger: verified + unverified lists, provenance tag, field denylist
//! - Validator: mandatory fields typed, malformed listings dropped
//! - Grouper: partition by machine id
//! - Reconciler: smallest chunks must tile the single largest chunk
//!
//! Deterministic, pure logic. No IO. Failures are per listing or per machine
//! and never abort the pass.

mod engine;
mod group;
mod merge;
mod pass;
mod types;
mod validate;

pub use engine::{reconcile, reconcile_machine, reconcile_report, RECONCILE_DROPPED_FIELDS};
pub use group::group_by_machine;
pub use merge::{merge, strip_irrelevant, IRRELEVANT_FIELDS};
pub use pass::run_pass;
pub use types::*;
pub use validate::{validate, validate_listing, validate_report};
