use thiserror::Error;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// CPU or memory could not be sampled
    #[error("Host stats unavailable: {0}")]
    HostStatsUnavailable(String),

    /// Containers could not be listed
    ///
    /// Never surfaced by [`super::TelemetryCollector::collect`], which reports no nodes instead.
    #[error("Container enumeration failed: {0}")]
    Enumeration(String),

    /// A reputation update carried an unusable value
    #[error("Invalid reputation update: {0}")]
    InvalidReputationUpdate(String),
}
