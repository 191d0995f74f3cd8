//! Grouper: partition validated listings by machine id.

use std::collections::BTreeMap;

use crate::{Listing, MachineGroup, MachineId};

/// Partition `listings` by machine id. Within a group the input order is kept.
pub fn group_by_machine(listings: Vec<Listing>) -> MachineGroup {
    let mut grouped = MachineGroup::new();
    for listing in listings {
        grouped.entry(listing.machine_id).or_default().push(listing);
    }
    grouped
}

/// Borrowing variant used for diagnostics that must not consume the listings.
pub(crate) fn index_by_machine(listings: &[Listing]) -> BTreeMap<MachineId, Vec<&Listing>> {
    let mut grouped: BTreeMap<MachineId, Vec<&Listing>> = BTreeMap::new();
    for listing in listings {
        grouped.entry(listing.machine_id).or_default().push(listing);
    }
    grouped
}
