//! vxe-daemon entry point.
//!
//! Thin: parses flags, loads config, sets up tracing, builds the shared
//! state, starts the update loop and serves HTTP. Handlers live in
//! `routes.rs`; the update pass lives in `updater.rs`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use vxe_config::{
    load_layered_yaml, normalize_listen_address, report_unused_keys, resolve_api_key,
    ExporterConfig, LoadedConfig, UnusedKeyPolicy,
};
use vxe_daemon::{routes, state};
use vxe_fetch::{MarketplaceSource, VastApiClient};
use vxe_metrics::ExporterMetrics;

#[derive(Parser, Debug)]
#[command(name = "vxe-daemon", version, about = "Vast.ai marketplace Prometheus exporter")]
struct Cli {
    /// YAML config layers, applied in order (later overrides earlier).
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,

    /// Vast.ai API key. Defaults to the env var named by api.key_env.
    #[arg(long)]
    api_key: Option<String>,

    /// Address to listen on for HTTP requests, e.g. `:8622` or `127.0.0.1:8622`.
    #[arg(long)]
    listen_address: Option<String>,

    /// Seconds between update passes.
    #[arg(long)]
    update_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    let loaded = if cli.config.is_empty() {
        LoadedConfig::empty()?
    } else {
        load_layered_yaml(&cli.config).context("config load failed")?
    };
    info!(config_hash = %loaded.config_hash, layers = cli.config.len(), "config loaded");

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &unused.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not used");
    }

    let mut cfg = ExporterConfig::from_json(&loaded.config_json)?;
    if let Some(addr) = cli.listen_address.as_deref() {
        cfg.listen_address = normalize_listen_address(addr)?;
    }
    if let Some(secs) = cli.update_interval_secs {
        anyhow::ensure!(secs > 0, "--update-interval-secs must be positive");
        cfg.update_interval_secs = secs;
    }

    let api_key = resolve_api_key(&cfg.api_key_env, cli.api_key.as_deref())?;
    info!(source = ?api_key.source, "api key resolved");

    let source: Arc<dyn MarketplaceSource> = Arc::new(
        VastApiClient::new(
            api_key.expose().to_string(),
            cfg.base_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
        .context("marketplace client init failed")?,
    );

    let metrics = Arc::new(ExporterMetrics::new().context("metrics registry init failed")?);
    let interval = Duration::from_secs(cfg.update_interval_secs);
    let shared = Arc::new(state::AppState::new(metrics, interval));

    let updater = state::spawn_update_loop(Arc::clone(&shared), source, interval);

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = tokio::net::TcpListener::bind(&cfg.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_address))?;
    info!(
        update_interval_secs = cfg.update_interval_secs,
        "vxe-daemon listening on http://{}", cfg.listen_address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    updater.abort();
    info!("vxe-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
}
