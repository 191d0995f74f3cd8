use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use vxe_offers::RawListing;

use crate::{Earnings, Endpoint, FetchError, MachineInfo, MarketplaceSource, OfferSnapshot};

/// Marketplace search query for on-demand, unbundled, non-external offers.
pub fn offers_query(verified: bool) -> String {
    let verified = if verified { "true" } else { "false" };
    json!({
        "external": {"eq": "false"},
        "verified": {"eq": verified},
        "type": "on-demand",
        "disable_bundling": true,
    })
    .to_string()
}

/// Vast.ai REST client.
///
/// API key is resolved by the caller and passed in; it travels only as the
/// `api_key` query parameter and is never logged.
#[derive(Clone)]
pub struct VastApiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for VastApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VastApiClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl VastApiClient {
    /// `base_url` is the API root, e.g. `https://console.vast.ai/api/v0`.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::Config("api key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_key,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET `path` with the key and `query`, decode the JSON body as `T`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!(endpoint = %endpoint, path, "marketplace request");

        let resp = self
            .http
            .get(self.url(path))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::Decode(format!("{endpoint} response: {e}")))
    }
}

#[async_trait::async_trait]
impl MarketplaceSource for VastApiClient {
    fn source_name(&self) -> &'static str {
        "vastai"
    }

    async fn fetch_offers(&self) -> Result<OfferSnapshot, FetchError> {
        let mut collections = Vec::with_capacity(2);
        for verified in [true, false] {
            let q = offers_query(verified);
            let body: OffersResponse = self
                .get_json(Endpoint::Offers, "bundles", &[("q", q.as_str())])
                .await?;
            debug!(verified, offers = body.offers.len(), "offers fetched");
            collections.push(body.offers);
        }
        let unverified = collections.pop().unwrap_or_default();
        let verified = collections.pop().unwrap_or_default();
        Ok(OfferSnapshot {
            verified,
            unverified,
        })
    }

    async fn fetch_machines(&self) -> Result<Vec<MachineInfo>, FetchError> {
        let body: MachinesResponse = self.get_json(Endpoint::Machines, "machines", &[]).await?;
        Ok(body.machines.into_iter().map(MachineWire::into_info).collect())
    }

    async fn fetch_earnings(&self) -> Result<Earnings, FetchError> {
        let body: EarningsResponse = self
            .get_json(Endpoint::Earnings, "users/me/machine-earnings", &[])
            .await?;
        Ok(Earnings {
            current_balance: body.current.balance.unwrap_or(0.0),
            current_service_fee: body.current.service_fee.unwrap_or(0.0),
            total_gpu: body.summary.total_gpu.unwrap_or(0.0),
        })
    }
}

/// reqwest errors print the request URL, which carries the key.
fn transport_error(e: reqwest::Error) -> FetchError {
    let timed_out = e.is_timeout();
    let e = e.without_url();
    if timed_out {
        FetchError::Transport(format!("request timed out: {e}"))
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Vast error bodies carry `msg` or `error`; fall back to the raw body.
fn api_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = parsed.as_ref().and_then(|v| {
        ["msg", "error", "detail"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    });
    match field {
        Some(m) => m,
        None if body.trim().is_empty() => "empty body".to_string(),
        None => body.chars().take(200).collect(),
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OffersResponse {
    offers: Vec<RawListing>,
}

#[derive(Debug, Deserialize)]
struct MachinesResponse {
    machines: Vec<MachineWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MachineWire {
    machine_id: Option<f64>,
    id: Option<f64>,
    hostname: Option<String>,
    num_gpus: Option<f64>,
    total_flops: Option<f64>,
    gpu_ram: Option<f64>,
    cpu_ram: Option<f64>,
    cpu_cores: Option<f64>,
}

impl MachineWire {
    fn into_info(self) -> MachineInfo {
        let machine_id = self.machine_id.or(self.id).unwrap_or(0.0);
        MachineInfo {
            machine_id: if machine_id >= 0.0 { machine_id as u64 } else { 0 },
            hostname: self.hostname.unwrap_or_default(),
            num_gpus: self.num_gpus.unwrap_or(0.0),
            total_flops: self.total_flops.unwrap_or(0.0),
            gpu_ram: self.gpu_ram.unwrap_or(0.0),
            cpu_ram: self.cpu_ram.unwrap_or(0.0),
            cpu_cores: self.cpu_cores.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EarningsResponse {
    current: EarningsCurrent,
    summary: EarningsSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EarningsCurrent {
    balance: Option<f64>,
    service_fee: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EarningsSummary {
    total_gpu: Option<f64>,
}

// -----------------
// Tests (no network)
// -----------------
