use thiserror::Error;

use crate::identity::IdentityError;
use crate::ledger::LedgerError;
use crate::profile::ConfigError;
use crate::telemetry::TelemetryError;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Identity store error
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Connection profile error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ledger gateway error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Telemetry error
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error ([`serde_json::Error`])
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal node error
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic node error
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Main result type
pub type Result<T> = std::result::Result<T, Error>;
