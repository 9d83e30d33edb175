use std::sync::Arc;

use tracing::{error, info, warn};

use self::http::{HttpServer, HttpServerConfig};
use crate::Result;
use crate::identity::{IdentityConfig, IdentityStore};
use crate::ledger::LedgerConfig;
use crate::ledger::OnDemandSessions;
use crate::ledger::fabric::FabricConnector;
use crate::metrics::Metrics;
use crate::service::DashboardService;
use crate::telemetry::{ReputationStore, TelemetryCollector, TelemetryConfig};

/// HTTP API
pub mod http;

/// Fabric dashboard backend
pub struct Node {
    /// Serve client requests
    http: HttpServer,
    /// Metrics
    _metrics: Metrics,
}

/// Node configuration
#[derive(Debug, Default, Clone)]
pub struct NodeConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Application user identity
    pub identity: IdentityConfig,
    /// Ledger connection
    pub ledger: LedgerConfig,
    /// Host and container telemetry
    pub telemetry: TelemetryConfig,
}

impl Node {
    /// Node constructor
    ///
    /// Nothing touches the network or the key material until the first request.
    pub fn init(config: NodeConfig) -> Result<Self> {
        let metrics = Metrics::default();

        let ledger_budget = config.ledger.timeouts.request_budget();
        if config.http.request_timeout <= ledger_budget {
            warn!(
                request_timeout = ?config.http.request_timeout,
                ledger_budget = ?ledger_budget,
                "HTTP request timeout does not cover a full submit, slow commits will end in a bare timeout"
            );
        }

        let identities = Arc::new(IdentityStore::with_file_system_wallet(config.identity));
        let connector = Arc::new(FabricConnector::new(config.ledger.timeouts));
        let sessions =
            OnDemandSessions::new(identities, connector, config.ledger, metrics.ledger.clone());
        let telemetry = TelemetryCollector::from_config(&config.telemetry, metrics.telemetry.clone());

        let service = DashboardService::new(
            Arc::new(sessions),
            Arc::new(telemetry),
            Arc::new(ReputationStore::new()),
            metrics.api.clone(),
        );
        let http = HttpServer::new(Arc::new(service), config.http)?;

        Ok(Self { http, _metrics: metrics })
    }

    /// Node running-task
    pub async fn entrypoint(self) {
        info!("Starting Fabric dashboard backend");

        if let Err(e) = self.http.serve().await {
            error!("Server error: {e}");
        }
    }
}
