use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use vxe_fetch::{offers_query, FetchError, MarketplaceSource, VastApiClient};

const KEY: &str = "test-key-123";

fn client(server: &MockServer) -> VastApiClient {
    VastApiClient::new(
        KEY.to_string(),
        server.base_url(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn offers_are_fetched_once_per_verification_state() {
    let server = MockServer::start_async().await;
    let verified = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/bundles")
                .query_param("api_key", KEY)
                .query_param("q", offers_query(true))
                .header("accept", "application/json");
            then.status(200).json_body(json!({
                "offers": [{"machine_id": 1, "num_gpus": 2, "gpu_name": "RTX 3090"}]
            }));
        })
        .await;
    let unverified = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/bundles")
                .query_param("api_key", KEY)
                .query_param("q", offers_query(false));
            then.status(200).json_body(json!({
                "offers": [{"machine_id": 2}, {"machine_id": 3}]
            }));
        })
        .await;

    let snapshot = client(&server).fetch_offers().await.unwrap();
    verified.assert_async().await;
    unverified.assert_async().await;

    assert_eq!(snapshot.verified.len(), 1);
    assert_eq!(snapshot.verified[0]["gpu_name"], json!("RTX 3090"));
    assert_eq!(snapshot.unverified.len(), 2);
}

#[tokio::test]
async fn machines_missing_numbers_default_to_zero() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/machines").query_param("api_key", KEY);
            then.status(200).json_body(json!({
                "machines": [
                    {"machine_id": 10, "hostname": "rig-a", "num_gpus": 4, "total_flops": 160.5,
                     "gpu_ram": 24576, "cpu_ram": 128000, "cpu_cores": 32, "listed": true},
                    {"machine_id": 11, "hostname": "rig-b"}
                ]
            }));
        })
        .await;

    let machines = client(&server).fetch_machines().await.unwrap();
    assert_eq!(machines.len(), 2);
    assert_eq!(machines[0].machine_id, 10);
    assert_eq!(machines[0].num_gpus, 4.0);
    assert_eq!(machines[0].total_flops, 160.5);
    assert_eq!(machines[1].hostname, "rig-b");
    assert_eq!(machines[1].num_gpus, 0.0);
    assert_eq!(machines[1].cpu_ram, 0.0);
}

#[tokio::test]
async fn earnings_are_read_from_current_and_summary() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/users/me/machine-earnings")
                .query_param("api_key", KEY);
            then.status(200).json_body(json!({
                "current": {"balance": 123.45, "service_fee": 6.5},
                "summary": {"total_gpu": 789.0, "total_stor": 1.0}
            }));
        })
        .await;

    let earnings = client(&server).fetch_earnings().await.unwrap();
    assert_eq!(earnings.current_balance, 123.45);
    assert_eq!(earnings.current_service_fee, 6.5);
    assert_eq!(earnings.total_gpu, 789.0);
}

#[tokio::test]
async fn non_success_status_maps_to_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/machines");
            then.status(401)
                .json_body(json!({"success": false, "msg": "Invalid user key"}));
        })
        .await;

    let err = client(&server).fetch_machines().await.unwrap_err();
    assert_eq!(
        err,
        FetchError::Api {
            status: 401,
            message: "Invalid user key".to_string()
        }
    );
    assert!(!err.to_string().contains(KEY));
}

#[tokio::test]
async fn unexpected_shape_maps_to_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/bundles");
            then.status(200).json_body(json!({"results": []}));
        })
        .await;

    let err = client(&server).fetch_offers().await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_transport_error_without_key() {
    // Nothing listens on port 9 of localhost.
    let c = VastApiClient::new(
        KEY.to_string(),
        "http://127.0.0.1:9".to_string(),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = c.fetch_earnings().await.unwrap_err();
    match err {
        FetchError::Transport(msg) => assert!(!msg.contains(KEY), "key leaked: {msg}"),
        other => panic!("expected transport error, got {other:?}"),
    }
}
