use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use fabric_dashboard_node::metrics::Metrics;
use fabric_dashboard_node::node::http::{HttpServerConfig, router};
use fabric_dashboard_node::service::DashboardService;
use fabric_dashboard_node::telemetry::{ReputationStore, TelemetryCollector};
use fabric_dashboard_node::test_utils::{
    MockConnector, MockSessions, StaticContainers, StaticHostProbe,
};
use tower::ServiceExt;

/// Router wired to an in-memory ledger and fixed telemetry
pub fn test_router(connector: MockConnector, containers: StaticContainers) -> Router {
    let metrics = Metrics::default();
    let telemetry = TelemetryCollector::new(
        Box::new(StaticHostProbe::default()),
        Box::new(containers),
        metrics.telemetry,
    );
    let service = DashboardService::new(
        Arc::new(MockSessions::new(connector)),
        Arc::new(telemetry),
        Arc::new(ReputationStore::new()),
        metrics.api,
    );

    router(Arc::new(service), &HttpServerConfig::default())
}

pub fn test_network() -> StaticContainers {
    StaticContainers::named([
        "peer0.org1.example.com",
        "peer0.org2.example.com",
        "orderer.example.com",
        "dev-peer0.org1.example.com-basic_1.0-4ec1",
    ])
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request and decode the JSON reply
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
