use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::Result;
use crate::ledger::{SessionFactory, with_session};
use crate::metrics::{MetricsApi, status_of};
use crate::telemetry::{ReputationStore, TelemetryCollector};
use crate::types::{
    AssetRecord, ClusterStats, CreateAssetResponse, ReputationScore, ReputationUpdate,
};

const LIST_ASSETS: &str = "GetAllAssets";
const CREATE_ASSET: &str = "CreateAsset";

/// Dashboard operations, independent of the transport serving them
pub struct DashboardService {
    sessions: Arc<dyn SessionFactory>,
    telemetry: Arc<TelemetryCollector>,
    reputation: Arc<ReputationStore>,
    metrics: MetricsApi,
}

impl DashboardService {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        telemetry: Arc<TelemetryCollector>,
        reputation: Arc<ReputationStore>,
        metrics: MetricsApi,
    ) -> Self {
        Self { sessions, telemetry, reputation, metrics }
    }

    /// All assets on the ledger, as returned by the chaincode
    ///
    /// Any failure is logged and reported as an empty list.
    #[tracing::instrument(skip(self), fields(operation = "api.list_assets"))]
    pub async fn list_assets(&self) -> Vec<serde_json::Value> {
        let timer = self.metrics.list_assets();

        let result = with_session(self.sessions.as_ref(), |session| {
            Box::pin(async move { session.evaluate(LIST_ASSETS, &[]).await })
        })
        .await
        .and_then(|bytes| parse_assets(&bytes));

        timer.finish(status_of(&result));
        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to list assets");
            Vec::new()
        })
    }

    /// Submit a `CreateAsset` transaction and wait for it to commit
    #[tracing::instrument(skip(self, asset), fields(operation = "api.create_asset", asset_id = %asset.id))]
    pub async fn create_asset(&self, asset: AssetRecord) -> Result<CreateAssetResponse> {
        let timer = self.metrics.create_asset();

        let args = asset.to_args();
        let result = with_session(self.sessions.as_ref(), |session| {
            Box::pin(async move { session.submit(CREATE_ASSET, &args).await })
        })
        .await;

        timer.finish(status_of(&result));
        result?;
        info!("Asset created");

        Ok(CreateAssetResponse::success())
    }

    /// Host usage and live network nodes
    #[tracing::instrument(skip(self), fields(operation = "api.stats"))]
    pub async fn stats(&self) -> Result<ClusterStats> {
        let timer = self.metrics.stats();

        let result = self.telemetry.collect().await;

        timer.finish(status_of(&result));
        Ok(result?)
    }

    /// Record the outcome of an interaction with a node
    #[tracing::instrument(
        skip(self, update),
        fields(operation = "api.update_reputation", node_id = %update.node_id)
    )]
    pub async fn update_reputation(&self, update: ReputationUpdate) -> Result<ReputationScore> {
        let timer = self.metrics.update_reputation();

        let result = self.reputation.update(&update).await;

        timer.finish(status_of(&result));
        Ok(ReputationScore { new_score: result? })
    }

    /// Reputation of every node reported so far
    pub async fn reputation(&self) -> BTreeMap<String, f64> {
        self.reputation.scores().await
    }
}

/// Chaincode output; an empty result means no assets
fn parse_assets(bytes: &[u8]) -> Result<Vec<serde_json::Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}
