//! Host and network node telemetry, and node reputation.

mod containers;
mod error;
mod host;
mod nodes;
mod reputation;

use std::time::Duration;

use tracing::{debug, warn};

pub use self::containers::{ContainerRecord, ContainerRuntime, DockerCli};
pub use self::error::TelemetryError;
pub use self::host::{HostProbe, SysinfoProbe};
pub use self::nodes::{classify, discover, health_score, is_network_node};
pub use self::reputation::{INITIAL_SCORE, ReputationStore, next_score};
use crate::metrics::{MetricsTelemetry, status_of};
use crate::types::ClusterStats;

/// [`TelemetryCollector`] configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Container runtime CLI
    pub docker_binary: String,
    /// Upper bound for listing containers
    pub enumeration_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            enumeration_timeout: Duration::from_secs(5),
        }
    }
}

/// Collects host usage and the live network topology
pub struct TelemetryCollector {
    host: Box<dyn HostProbe>,
    containers: Box<dyn ContainerRuntime>,
    metrics: MetricsTelemetry,
}

impl TelemetryCollector {
    pub fn new(
        host: Box<dyn HostProbe>,
        containers: Box<dyn ContainerRuntime>,
        metrics: MetricsTelemetry,
    ) -> Self {
        Self { host, containers, metrics }
    }

    /// Collector reading the local host and the `docker` CLI
    pub fn from_config(config: &TelemetryConfig, metrics: MetricsTelemetry) -> Self {
        Self::new(
            Box::new(SysinfoProbe),
            Box::new(DockerCli::new(config.docker_binary.clone(), config.enumeration_timeout)),
            metrics,
        )
    }

    /// Sample the host and list the allow-listed network nodes
    ///
    /// Only host sampling can fail; an enumeration failure yields an empty node list.
    #[tracing::instrument(skip(self), fields(operation = "telemetry.collect"))]
    pub async fn collect(&self) -> Result<ClusterStats, TelemetryError> {
        let timer = self.metrics.collect();

        let (host, containers) = tokio::join!(self.host.sample(), self.containers.list());
        let result = host.map(|host| {
            let records = containers.unwrap_or_else(|e| {
                warn!(error = %e, "Container enumeration failed, reporting no nodes");
                Vec::new()
            });
            let running = records.iter().filter(|record| record.is_running());
            let peers = discover(running.map(ContainerRecord::name), &mut rand::rng());
            debug!(containers = records.len(), nodes = peers.len(), "Discovered network nodes");
            self.metrics.discovered_nodes(peers.len() as u64);

            ClusterStats::new(host, peers)
        });

        timer.finish(status_of(&result));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::test_utils::{StaticContainers, StaticHostProbe};
    use crate::types::NodeRole;

    fn collector(host: StaticHostProbe, containers: StaticContainers) -> TelemetryCollector {
        TelemetryCollector::new(Box::new(host), Box::new(containers), Metrics::default().telemetry)
    }

    #[tokio::test]
    async fn test_collect_filters_and_scores() {
        let collector = collector(
            StaticHostProbe::default(),
            StaticContainers::named([
                "peer0.org1.example.com",
                "peer0.org2.example.com",
                "orderer.example.com",
                "dev-peer0.org1.example.com-basic_1.0",
                "cli",
            ]),
        );

        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.peers.len(), 3);
        assert_eq!(stats.peers[2].role, NodeRole::Orderer);
        assert!((stats.peers[2].health_score - 100.0).abs() < f64::EPSILON);
        assert!((stats.ram_total - StaticHostProbe::default().stats.ram_total_gib).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_not_fatal() {
        let collector = collector(StaticHostProbe::default(), StaticContainers::failing());

        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.node_count, 0);
        assert!(stats.peers.is_empty());
        assert!(stats.ram_total > 0.0);
    }

    #[tokio::test]
    async fn test_stopped_containers_are_skipped() {
        let collector = collector(
            StaticHostProbe::default(),
            StaticContainers::with_states([
                ("peer0.org1.example.com", "running"),
                ("peer0.org2.example.com", "exited"),
                ("orderer.example.com", "running"),
            ]),
        );

        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.node_count, 2);
        assert!(stats.peers.iter().all(|peer| peer.role != NodeRole::PeerOrg2));
    }

    #[tokio::test]
    async fn test_no_containers() {
        let collector = collector(StaticHostProbe::default(), StaticContainers::default());

        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.node_count, 0);
    }

    #[tokio::test]
    async fn test_host_failure_is_fatal() {
        let collector = collector(
            StaticHostProbe::failing(),
            StaticContainers::named(["orderer.example.com"]),
        );

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, TelemetryError::HostStatsUnavailable(_)));
    }
}
