use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use crate::secrets::api_key_env_name;

pub const DEFAULT_BASE_URL: &str = "https://console.vast.ai/api/v0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8622";
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;

/// Typed view of the effective config. Every field has a default, so an
/// empty config is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExporterConfig {
    pub base_url: String,
    /// Env var NAME holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub listen_address: String,
    pub update_interval_secs: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: crate::DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

impl ExporterConfig {
    /// Read the typed settings out of the merged config JSON.
    ///
    /// # Errors
    /// A present value of the wrong type, a zero timeout or interval, or a
    /// malformed listen address.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let defaults = Self::default();

        let base_url = read_string(config_json, "/api/base_url")?
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let timeout_secs =
            read_positive(config_json, "/api/timeout_secs")?.unwrap_or(defaults.timeout_secs);
        let listen_address = match read_string(config_json, "/server/listen_address")? {
            Some(raw) => normalize_listen_address(&raw)?,
            None => defaults.listen_address,
        };
        let update_interval_secs = read_positive(config_json, "/update/interval_secs")?
            .unwrap_or(defaults.update_interval_secs);

        Ok(Self {
            base_url,
            api_key_env: api_key_env_name(config_json),
            timeout_secs,
            listen_address,
            update_interval_secs,
        })
    }
}

/// Accept `host:port` or the port-only `:port` form, which binds all
/// interfaces.
pub fn normalize_listen_address(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let addr = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };

    let port_ok = addr
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !port_ok {
        bail!("CONFIG_INVALID: listen address '{}' is not host:port", raw);
    }
    Ok(addr)
}

fn read_string(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("CONFIG_INVALID: {} must be a string, got {}", pointer, other),
    }
}

fn read_positive(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => Ok(Some(n)),
            _ => bail!("CONFIG_INVALID: {} must be a positive integer, got {}", pointer, v),
        },
    }
}
