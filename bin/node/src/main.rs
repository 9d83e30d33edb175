use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fabric_dashboard_node::{
    Node, NodeConfig, Result,
    identity::IdentityConfig,
    ledger::{DiscoveryOptions, LedgerConfig, LedgerTimeouts},
    logging::{TracingConfig, setup_tracing},
    node::http::HttpServerConfig,
    telemetry::TelemetryConfig,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "fabric-dashboard")]
#[command(about = "Fabric Dashboard - asset ledger and network telemetry API")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "DASHBOARD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(long, env = "DASHBOARD_PORT", default_value = "4000")]
    port: u16,

    /// Maximum number of requests served concurrently
    #[arg(long, default_value = "1024")]
    max_connections: usize,

    /// HTTP request timeout in seconds (defaults to the ledger submit budget plus headroom)
    #[arg(long)]
    request_timeout_seconds: Option<u64>,

    /// Connection profile (YAML, or JSON with a `.json` extension)
    #[arg(long, env = "FABRIC_CONNECTION_PROFILE", default_value = "connection-org1.yaml")]
    connection_profile: PathBuf,

    /// Channel name
    #[arg(long, env = "FABRIC_CHANNEL", default_value = "mychannel")]
    channel: String,

    /// Chaincode name
    #[arg(long, env = "FABRIC_CHAINCODE", default_value = "basic")]
    chaincode: String,

    /// Disable endorser discovery and pin endorsers to the profile's organizations
    #[arg(long)]
    no_discovery: bool,

    /// Dial endpoints at their advertised host names instead of `localhost`
    #[arg(long)]
    no_as_localhost: bool,

    /// Wallet label of the application user
    #[arg(long, env = "FABRIC_USER", default_value = "appUser")]
    user: String,

    /// MSP ID of the application user
    #[arg(long, env = "FABRIC_MSP_ID", default_value = "Org1MSP")]
    msp_id: String,

    /// Wallet directory
    #[arg(long, env = "FABRIC_WALLET", default_value = "wallet")]
    wallet: PathBuf,

    /// Signing certificate of the user (defaults to the fabric-samples test network)
    #[arg(long, env = "FABRIC_CERT_PATH")]
    cert_path: Option<PathBuf>,

    /// MSP keystore directory of the user (defaults to the fabric-samples test network)
    #[arg(long, env = "FABRIC_KEYSTORE")]
    keystore: Option<PathBuf>,

    /// Container runtime CLI used for node discovery
    #[arg(long, env = "DOCKER_BIN", default_value = "docker")]
    docker: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let tracing_cfg = TracingConfig::from_env();
    setup_tracing(tracing_cfg.clone())?;

    let defaults = IdentityConfig::default();
    let identity = IdentityConfig {
        label: args.user,
        msp_id: args.msp_id,
        wallet_dir: args.wallet,
        certificate_path: args.cert_path.unwrap_or(defaults.certificate_path),
        key_store_dir: args.keystore.unwrap_or(defaults.key_store_dir),
    };
    let ledger = LedgerConfig {
        profile_path: args.connection_profile,
        channel: args.channel,
        chaincode: args.chaincode,
        discovery: DiscoveryOptions {
            enabled: !args.no_discovery,
            as_localhost: !args.no_as_localhost,
        },
        timeouts: LedgerTimeouts::default(),
    };

    info!(host = %args.host, port = args.port, "HTTP API");
    info!(
        profile = %ledger.profile_path.display(),
        channel = %ledger.channel,
        chaincode = %ledger.chaincode,
        discovery = ledger.discovery.enabled,
        as_localhost = ledger.discovery.as_localhost,
        "Ledger"
    );
    info!(label = %identity.label, msp_id = %identity.msp_id, wallet = %identity.wallet_dir.display(), "Identity");
    info!(
        otel = tracing_cfg.otel.is_enabled(),
        format = ?tracing_cfg.format,
        "Telemetry"
    );

    let http_defaults = HttpServerConfig::default();
    let config = NodeConfig {
        http: HttpServerConfig {
            host: args.host,
            port: args.port,
            max_connections: args.max_connections,
            request_timeout: args
                .request_timeout_seconds
                .map_or(http_defaults.request_timeout, Duration::from_secs),
        },
        identity,
        ledger,
        telemetry: TelemetryConfig { docker_binary: args.docker, ..Default::default() },
    };

    let node = Node::init(config)?;
    node.entrypoint().await;

    Ok(())
}
