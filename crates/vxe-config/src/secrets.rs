//! API key resolution.
//!
//! Config YAML stores only the env var NAME holding the key (`/api/key_env`).
//! The key is resolved once at startup and handed to the fetcher; nothing
//! else reads the environment for it. `Debug` redacts the value and errors
//! name the variable, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

/// Env var consulted when `/api/key_env` is absent.
pub const DEFAULT_API_KEY_ENV: &str = "VASTAI_API_KEY";

/// Where the resolved key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    CommandLine,
    Env(String),
}

/// Marketplace API key. **Value is redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedApiKey {
    value: String,
    pub source: ApiKeySource,
}

impl ResolvedApiKey {
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for ResolvedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedApiKey")
            .field("value", &"<REDACTED>")
            .field("source", &self.source)
            .finish()
    }
}

/// Read a non-empty trimmed string at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Name of the env var holding the API key, per config or default.
pub(crate) fn api_key_env_name(config_json: &Value) -> String {
    read_str_at(config_json, "/api/key_env").unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string())
}

/// Resolve the marketplace API key.
///
/// A non-blank `cli_override` wins; otherwise the env var named `key_env`
/// (see [`crate::ExporterConfig::api_key_env`]) is read.
///
/// # Errors
/// SECRETS_MISSING naming the env var when neither source yields a key.
pub fn resolve_api_key(key_env: &str, cli_override: Option<&str>) -> Result<ResolvedApiKey> {
    if let Some(key) = cli_override.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(ResolvedApiKey {
            value: key.to_string(),
            source: ApiKeySource::CommandLine,
        });
    }

    match resolve_env(key_env) {
        Some(value) => Ok(ResolvedApiKey {
            value,
            source: ApiKeySource::Env(key_env.to_string()),
        }),
        None => bail!(
            "SECRETS_MISSING: no API key; pass --api-key or set env var '{}'",
            key_env
        ),
    }
}
