mod error;
pub mod fabric;
mod gateway;
mod session;

use std::path::PathBuf;
use std::time::Duration;

pub use self::error::{LedgerError, Phase};
pub use self::gateway::{GatewayConnection, GatewayConnector};
pub use self::session::{LedgerSession, OnDemandSessions, SessionFactory, with_session};

/// Peer discovery behaviour passed through to the gateway connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Let the gateway peer discover endorsers; otherwise endorsers are pinned to the
    /// organizations listed in the connection profile
    pub enabled: bool,
    /// Reach endpoints on `localhost`, keeping their advertised names for TLS verification
    pub as_localhost: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self { enabled: true, as_localhost: true }
    }
}

/// Upper bounds for gateway operations
#[derive(Debug, Clone, Copy)]
pub struct LedgerTimeouts {
    pub connect: Duration,
    pub evaluate: Duration,
    pub endorse: Duration,
    pub submit: Duration,
    pub commit_status: Duration,
}

impl Default for LedgerTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            evaluate: Duration::from_secs(5),
            endorse: Duration::from_secs(15),
            submit: Duration::from_secs(5),
            commit_status: Duration::from_secs(60),
        }
    }
}

impl LedgerTimeouts {
    /// Bound for a whole submit: endorsement, ordering and commit
    pub fn submit_total(&self) -> Duration {
        self.endorse + self.submit + self.commit_status
    }

    /// Bound for the slowest request: connecting, then a whole submit
    pub fn request_budget(&self) -> Duration {
        self.connect + self.submit_total()
    }
}

/// Ledger session configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Connection profile document
    pub profile_path: PathBuf,
    /// Channel name
    pub channel: String,
    /// Chaincode name
    pub chaincode: String,
    pub discovery: DiscoveryOptions,
    pub timeouts: LedgerTimeouts,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("connection-org1.yaml"),
            channel: "mychannel".to_string(),
            chaincode: "basic".to_string(),
            discovery: DiscoveryOptions::default(),
            timeouts: LedgerTimeouts::default(),
        }
    }
}
