//! Marketplace boundary: snapshot types, error type and the source trait.
//!
//! Nothing here knows about HTTP. The daemon holds an
//! `Arc<dyn MarketplaceSource>` so tests can swap the API client for an
//! in-process fake.

use std::fmt;

use serde::Serialize;
use vxe_offers::RawListing;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Both offer collections from one fetch, exactly as returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferSnapshot {
    pub verified: Vec<RawListing>,
    pub unverified: Vec<RawListing>,
}

/// One of the account's own machines. Numeric fields the API omits read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineInfo {
    pub machine_id: u64,
    pub hostname: String,
    pub num_gpus: f64,
    pub total_flops: f64,
    pub gpu_ram: f64,
    pub cpu_ram: f64,
    pub cpu_cores: f64,
}

/// Account earnings summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Earnings {
    pub current_balance: f64,
    pub current_service_fee: f64,
    pub total_gpu: f64,
}

/// Upstream endpoint a fetch targets. Used as the `endpoint` label on error
/// counters and as the key of per-endpoint status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Offers,
    Machines,
    Earnings,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Offers, Endpoint::Machines, Endpoint::Earnings];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Offers => "bundles",
            Endpoint::Machines => "machines",
            Endpoint::Earnings => "machine-earnings",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`MarketplaceSource`] may return. Messages never carry the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, timeout, or unreadable body.
    Transport(String),
    /// The API answered with a non-success status.
    Api { status: u16, message: String },
    /// The body was not the JSON shape expected.
    Decode(String),
    /// Client could not be built from the given settings.
    Config(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Api { status, message } => {
                write!(f, "marketplace api error status={status}: {message}")
            }
            FetchError::Decode(msg) => write!(f, "decode error: {msg}"),
            FetchError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Where marketplace data comes from.
#[async_trait::async_trait]
pub trait MarketplaceSource: Send + Sync {
    /// Short name reported in `/v1/status` and pass logs.
    fn source_name(&self) -> &'static str;

    /// Verified and unverified on-demand offers.
    async fn fetch_offers(&self) -> Result<OfferSnapshot, FetchError>;

    /// The account's machines.
    async fn fetch_machines(&self) -> Result<Vec<MachineInfo>, FetchError>;

    async fn fetch_earnings(&self) -> Result<Earnings, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_labels_match_api_paths() {
        let labels: Vec<&str> = Endpoint::ALL.iter().map(Endpoint::as_str).collect();
        assert_eq!(labels, vec!["bundles", "machines", "machine-earnings"]);
    }

    #[test]
    fn fetch_error_display() {
        let err = FetchError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "marketplace api error status=401: invalid api key"
        );
        assert_eq!(
            FetchError::Decode("x".into()).to_string(),
            "decode error: x"
        );
    }
}
