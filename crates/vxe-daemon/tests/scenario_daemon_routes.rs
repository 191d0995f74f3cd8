//! In-process scenario tests for vxe-daemon HTTP endpoints.
//!
//! The router is driven with `tower::ServiceExt::oneshot`; no socket is bound.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt; // oneshot
use vxe_daemon::{routes, state};
use vxe_metrics::ExporterMetrics;
use vxe_offers::run_pass;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> Arc<state::AppState> {
    let metrics = Arc::new(ExporterMetrics::new().unwrap());
    Arc::new(state::AppState::new(metrics, Duration::from_secs(60)))
}

async fn get(
    st: &Arc<state::AppState>,
    uri: &str,
) -> (StatusCode, Option<String>, bytes::Bytes) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, content_type, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (status, _, body) = get(&make_state(), "/v1/health").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "vxe-daemon");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn index_links_to_metrics() {
    let (status, content_type, body) = get(&make_state(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8_lossy(&body).contains("href=\"/metrics\""));
}

#[tokio::test]
async fn metrics_are_prometheus_text() {
    let st = make_state();
    let offers = vec![json!({
        "machine_id": 42, "gpu_name": "RTX 3090", "num_gpus": 2,
        "dph_base": 0.5, "rentable": true, "gpu_frac": 0.0
    })
    .as_object()
    .cloned()
    .unwrap()];
    st.metrics.record_offers(&run_pass(offers, vec![]));

    let (status, content_type, body) = get(&st, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain; version=0.0.4"));

    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains(
        r#"vastai_offer_machine_num_gpus{gpu_name="RTX 3090",machine_id="42",verified="true"} 2"#
    ));
    assert!(text.contains(r#"vastai_update_errors_total{endpoint="bundles"} 0"#));
}

#[tokio::test]
async fn status_before_first_pass_is_empty() {
    let (status, _, body) = get(&make_state(), "/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["update_interval_secs"], 60);
    assert_eq!(json["update"]["passes_total"], 0);
    assert!(json["update"]["source"].is_null());
    assert!(json["update"]["last_pass_id"].is_null());
    assert!(json["update"]["offers"].is_null());
}

#[tokio::test]
async fn status_uptime_counts_from_state_construction() {
    let st = make_state();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // No request has touched the state before this one.
    let (status, _, body) = get(&st, "/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse_json(body)["daemon_uptime_secs"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _, _) = get(&make_state(), "/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
