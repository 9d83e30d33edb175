use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ledger::LedgerTimeouts;
use crate::service::DashboardService;
use crate::telemetry::TelemetryError;
use crate::types::{
    AssetRecord, ClusterStats, CreateAssetResponse, ReputationScore, ReputationUpdate,
};

/// Time a request may spend outside ledger calls (identity lookup, profile loading, encoding)
const REQUEST_HEADROOM: Duration = Duration::from_secs(10);

/// Dashboard HTTP API server
pub struct HttpServer {
    service: Arc<DashboardService>,
    addr: SocketAddr,
    config: HttpServerConfig,
}

/// [`HttpServer`] configuration
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum number of requests served concurrently
    pub max_connections: usize,
    /// Request timeout
    ///
    /// Must exceed [`LedgerTimeouts::request_budget`] so ledger timeouts are reported as ledger
    /// errors rather than cut short by the HTTP layer.
    pub request_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            max_connections: 1024,
            request_timeout: LedgerTimeouts::default().request_budget() + REQUEST_HEADROOM,
        }
    }
}

impl HttpServer {
    /// Fails if the configured host and port do not form a socket address
    pub fn new(service: Arc<DashboardService>, config: HttpServerConfig) -> crate::Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse::<SocketAddr>()
            .map_err(|e| crate::Error::Internal(format!("Invalid address: {e}")))?;
        Ok(Self { service, addr, config })
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "HTTP API listening");

        axum::serve(listener, router(self.service, &self.config))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Internal(format!("Server error: {e}")))
    }
}

/// API routes with CORS, request tracing, timeout and concurrency limit
pub fn router(service: Arc<DashboardService>, config: &HttpServerConfig) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any);

    Router::new()
        .route("/api/assets", get(list_assets))
        .route("/api/asset", post(create_asset))
        .route("/api/stats", get(stats))
        .route("/api/reputation", get(reputation).post(update_reputation))
        .with_state(service)
        .layer(GlobalConcurrencyLimitLayer::new(config.max_connections))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn list_assets(State(service): State<Arc<DashboardService>>) -> Json<Vec<serde_json::Value>> {
    Json(service.list_assets().await)
}

async fn create_asset(
    State(service): State<Arc<DashboardService>>,
    payload: Result<Json<AssetRecord>, JsonRejection>,
) -> Result<Json<CreateAssetResponse>, ApiError> {
    let Json(asset) = payload?;
    Ok(Json(service.create_asset(asset).await?))
}

async fn stats(State(service): State<Arc<DashboardService>>) -> Result<Json<ClusterStats>, ApiError> {
    Ok(Json(service.stats().await?))
}

async fn reputation(State(service): State<Arc<DashboardService>>) -> Json<BTreeMap<String, f64>> {
    Json(service.reputation().await)
}

async fn update_reputation(
    State(service): State<Arc<DashboardService>>,
    payload: Result<Json<ReputationUpdate>, JsonRejection>,
) -> Result<Json<ReputationScore>, ApiError> {
    let Json(update) = payload?;
    Ok(Json(service.update_reputation(update).await?))
}

/// Failure reported as `{"error": "<message>"}`
///
/// Unreadable request bodies keep the extractor's 4xx status and invalid reputation updates
/// are a 400. Everything else is a 500.
#[derive(Debug)]
pub enum ApiError {
    Rejected(JsonRejection),
    Failed(crate::Error),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        Self::Failed(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Rejected(rejection) => (rejection.status(), rejection.body_text()),
            Self::Failed(err) => {
                let status = if matches!(
                    err,
                    crate::Error::Telemetry(TelemetryError::InvalidReputationUpdate(_))
                ) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.to_string())
            },
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down HTTP API");
}
