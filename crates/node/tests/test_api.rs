mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use fabric_dashboard_node::ledger::LedgerError;
use fabric_dashboard_node::telemetry::{INITIAL_SCORE, next_score};
use fabric_dashboard_node::test_utils::{MockConnector, StaticContainers};
use serde_json::json;

use self::common::*;

fn asset1() -> serde_json::Value {
    json!({"id": "asset1", "color": "blue", "size": "10", "owner": "Tom", "value": "500"})
}

#[tokio::test]
async fn test_create_then_list_assets() {
    let connector = MockConnector::default();
    let router = test_router(connector.clone(), test_network());

    let (status, body) = send(&router, post_json("/api/asset", &asset1())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Success"}));

    let (status, body) = send(&router, get("/api/assets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["ID"], "asset1");
    assert_eq!(body[0]["Owner"], "Tom");

    assert_eq!(connector.state.connects.load(Ordering::SeqCst), 2);
    assert_eq!(connector.state.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_create_asset_endorsement_failure() {
    let connector = MockConnector::default();
    connector.fail_submit(LedgerError::EndorsementFailed(
        "chaincode response 500, the asset asset1 already exists".to_string(),
    ));
    let router = test_router(connector.clone(), test_network());

    let (status, body) = send(&router, post_json("/api/asset", &asset1())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("the asset asset1 already exists"));
    assert_eq!(connector.state.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_asset_requires_all_fields() {
    let connector = MockConnector::default();
    let router = test_router(connector.clone(), test_network());

    let mut incomplete = asset1();
    incomplete.as_object_mut().unwrap().remove("owner");

    let (status, body) = send(&router, post_json("/api/asset", &incomplete)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("owner"));
    assert_eq!(connector.state.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_asset_requires_json_body() {
    let router = test_router(MockConnector::default(), test_network());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/asset")
        .body(axum::body::Body::from("id=asset1"))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_assets_when_ledger_unreachable() {
    let connector = MockConnector::default();
    connector.fail_connect(LedgerError::ConnectFailed("peer0.org1.example.com: refused".to_string()));
    let router = test_router(connector, test_network());

    let (status, body) = send(&router, get("/api/assets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_stats_shape() {
    let router = test_router(MockConnector::default(), test_network());

    let (status, body) = send(&router, get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodeCount"], 3);
    assert!(body["cpu"].is_number());
    assert!(body["ramUsed"].is_number());
    assert!(body["ramTotal"].is_number());

    let peers = body["peers"].as_array().unwrap();
    let types: Vec<&str> = peers.iter().map(|peer| peer["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["Peer-Org1", "Peer-Org2", "Orderer"]);
    assert_eq!(peers[2]["name"], "Orderer Authority");
    assert_eq!(peers[2]["score"], 100.0);
    for peer in &peers[..2] {
        let score = peer["score"].as_f64().unwrap();
        assert!((95.0..98.0).contains(&score));
    }
}

#[tokio::test]
async fn test_stats_without_container_runtime() {
    let router = test_router(MockConnector::default(), StaticContainers::failing());

    let (status, body) = send(&router, get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodeCount"], 0);
    assert_eq!(body["peers"], json!([]));
}

#[tokio::test]
async fn test_reputation_updates() {
    let router = test_router(MockConnector::default(), test_network());

    let (status, body) = send(&router, get("/api/reputation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, body) = send(
        &router,
        post_json("/api/reputation", &json!({"node_id": 3, "success": true, "distance": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = next_score(INITIAL_SCORE, true, 2.0);
    assert!((body["new_score"].as_f64().unwrap() - first).abs() < 1e-9);

    let (_, body) = send(&router, post_json("/api/reputation", &json!({"node_id": "3"}))).await;
    let second = next_score(first, false, 1.0);
    assert!((body["new_score"].as_f64().unwrap() - second).abs() < 1e-9);

    let (_, body) = send(&router, get("/api/reputation")).await;
    assert!((body["3"].as_f64().unwrap() - second).abs() < 1e-9);
}

#[tokio::test]
async fn test_reputation_rejects_negative_distance() {
    let router = test_router(MockConnector::default(), test_network());

    let (status, body) = send(
        &router,
        post_json("/api/reputation", &json!({"node_id": "peer0", "success": true, "distance": -2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("distance"));

    let (_, body) = send(&router, get("/api/reputation")).await;
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let router = test_router(MockConnector::default(), test_network());

    let request = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/api/asset")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_unknown_route() {
    let router = test_router(MockConnector::default(), test_network());

    let (status, _) = send(&router, get("/api/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
