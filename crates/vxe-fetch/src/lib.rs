//! vxe-fetch
//!
//! Marketplace data fetchers: offers (verified + unverified), the account's
//! machines, and its earnings. The [`MarketplaceSource`] trait is the seam;
//! [`VastApiClient`] is the HTTP implementation.

mod source;
mod vast;

pub use source::{Earnings, Endpoint, FetchError, MachineInfo, MarketplaceSource, OfferSnapshot};
pub use vast::{offers_query, VastApiClient};
