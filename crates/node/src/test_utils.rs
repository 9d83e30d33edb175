//! Fixtures and test doubles for the identity, ledger and telemetry layers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use p256::pkcs8::{EncodePrivateKey, LineEnding};

use crate::identity::{Identity, IdentityConfig};
use crate::ledger::{
    DiscoveryOptions, GatewayConnection, GatewayConnector, LedgerError, LedgerSession,
    LedgerTimeouts, SessionFactory,
};
use crate::metrics::Metrics;
use crate::profile::ConnectionProfile;
use crate::telemetry::{ContainerRecord, ContainerRuntime, HostProbe, TelemetryError};
use crate::types::HostStats;

pub const TEST_MSP_ID: &str = "Org1MSP";

/// Placeholder certificate; only ever carried around, never parsed
pub const TEST_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----\n\
    MIICKTCCAdCgAwIBAgIQFabricDashboardTestCertificate0000000000000=\n\
    -----END CERTIFICATE-----\n";

/// PKCS#8 PEM of a fixed P-256 key
pub fn test_private_key() -> String {
    let secret = p256::SecretKey::from_slice(&[0x11; 32]).unwrap();
    secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
}

pub fn test_identity(label: &str) -> Identity {
    Identity {
        label: label.to_string(),
        msp_id: TEST_MSP_ID.to_string(),
        certificate: TEST_CERTIFICATE.to_string(),
        private_key: test_private_key(),
    }
}

/// Lay out an MSP directory (`signcerts/cert.pem`, `keystore/*_sk`) under `root`
///
/// The returned config points at it, with the wallet in `root/wallet`.
pub fn write_key_material(root: &Path) -> IdentityConfig {
    let msp = root.join("msp");
    let certificate_path = msp.join("signcerts").join("cert.pem");
    let key_store_dir = msp.join("keystore");

    std::fs::create_dir_all(msp.join("signcerts")).unwrap();
    std::fs::create_dir_all(&key_store_dir).unwrap();
    std::fs::write(&certificate_path, TEST_CERTIFICATE).unwrap();
    std::fs::write(key_store_dir.join("3f9a1c_sk"), test_private_key()).unwrap();

    IdentityConfig {
        label: "appUser".to_string(),
        msp_id: TEST_MSP_ID.to_string(),
        wallet_dir: root.join("wallet"),
        certificate_path,
        key_store_dir,
    }
}

/// Write a one-peer connection profile to `root/connection-org1.yaml`
pub fn write_profile(root: &Path) -> PathBuf {
    let path = root.join("connection-org1.yaml");
    std::fs::write(
        &path,
        "name: test-network-org1\n\
         client:\n  organization: Org1\n\
         organizations:\n  Org1:\n    mspid: Org1MSP\n    peers: [peer0.org1.example.com]\n\
         peers:\n  peer0.org1.example.com:\n    url: grpcs://localhost:7051\n",
    )
    .unwrap();
    path
}

/// Shared record of what a [`MockConnector`] and its connections did
#[derive(Default)]
pub struct MockState {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub evaluates: AtomicUsize,
    pub submits: AtomicUsize,
    assets: Mutex<Vec<String>>,
    last_msp_id: Mutex<Option<String>>,
    last_args: Mutex<Vec<String>>,
    connect_error: Mutex<Option<LedgerError>>,
    submit_error: Mutex<Option<LedgerError>>,
    evaluate_result: Mutex<Option<Vec<u8>>>,
    evaluate_delay: Mutex<Option<Duration>>,
}

impl MockState {
    pub fn last_msp_id(&self) -> Option<String> {
        self.last_msp_id.lock().unwrap().clone()
    }

    /// Function name and arguments of the last evaluate or submit
    pub fn last_args(&self) -> Vec<String> {
        self.last_args.lock().unwrap().clone()
    }
}

/// In-memory ledger behind the [`GatewayConnector`] seam
///
/// `CreateAsset` appends an asset and `GetAllAssets` returns them as a JSON array. Failures and
/// delays can be injected.
#[derive(Default, Clone)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub fn fail_connect(&self, error: LedgerError) {
        *self.state.connect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_submit(&self, error: LedgerError) {
        *self.state.submit_error.lock().unwrap() = Some(error);
    }

    /// Raw JSON object returned by `GetAllAssets`
    pub fn seed_asset(&self, asset: &str) {
        self.state.assets.lock().unwrap().push(asset.to_string());
    }

    /// Return `result` from every evaluate instead of the asset list
    pub fn set_evaluate_result(&self, result: &[u8]) {
        *self.state.evaluate_result.lock().unwrap() = Some(result.to_vec());
    }

    pub fn delay_evaluate(&self, delay: Duration) {
        *self.state.evaluate_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait::async_trait]
impl GatewayConnector for MockConnector {
    async fn connect(
        &self,
        identity: &Identity,
        _profile: &ConnectionProfile,
        _discovery: DiscoveryOptions,
    ) -> Result<Box<dyn GatewayConnection>, LedgerError> {
        if let Some(error) = self.state.connect_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.last_msp_id.lock().unwrap() = Some(identity.msp_id.clone());

        Ok(Box::new(MockConnection { state: self.state.clone(), closed: false }))
    }
}

pub struct MockConnection {
    state: Arc<MockState>,
    closed: bool,
}

impl MockConnection {
    fn record(&self, function: &str, args: &[String]) -> Result<(), LedgerError> {
        if self.closed {
            return Err(LedgerError::ConnectFailed("connection closed".to_string()));
        }
        let mut last_args = vec![function.to_string()];
        last_args.extend_from_slice(args);
        *self.state.last_args.lock().unwrap() = last_args;
        Ok(())
    }
}

#[async_trait::async_trait]
impl GatewayConnection for MockConnection {
    async fn evaluate(
        &self,
        _channel: &str,
        _chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError> {
        self.record(function, args)?;
        self.state.evaluates.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.evaluate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(result) = self.state.evaluate_result.lock().unwrap().clone() {
            return Ok(result);
        }

        let assets = self.state.assets.lock().unwrap().join(",");
        Ok(format!("[{assets}]").into_bytes())
    }

    async fn submit(
        &self,
        _channel: &str,
        _chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError> {
        self.record(function, args)?;
        self.state.submits.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.state.submit_error.lock().unwrap().clone() {
            return Err(error);
        }
        if function == "CreateAsset" {
            let [id, color, size, owner, value] = args else {
                return Err(LedgerError::EndorsementFailed(format!(
                    "CreateAsset expects 5 arguments, got {}",
                    args.len()
                )));
            };
            let asset = serde_json::json!({
                "ID": id,
                "Color": color,
                "Size": size,
                "Owner": owner,
                "AppraisedValue": value,
            });
            self.state.assets.lock().unwrap().push(asset.to_string());
        }

        Ok(Vec::new())
    }

    fn close(&mut self) {
        self.closed = true;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`SessionFactory`] over a [`MockConnector`], skipping identity and profile resolution
pub struct MockSessions {
    pub connector: MockConnector,
    timeouts: LedgerTimeouts,
}

impl MockSessions {
    pub fn new(connector: MockConnector) -> Self {
        Self { connector, timeouts: LedgerTimeouts::default() }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: LedgerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[async_trait::async_trait]
impl SessionFactory for MockSessions {
    async fn open(&self) -> crate::Result<LedgerSession> {
        let connection = self
            .connector
            .connect(
                &test_identity("appUser"),
                &ConnectionProfile::default(),
                DiscoveryOptions::default(),
            )
            .await?;

        Ok(LedgerSession::new(
            connection,
            "mychannel",
            "basic",
            self.timeouts,
            Metrics::default().ledger,
        ))
    }
}

/// [`HostProbe`] returning fixed readings
#[derive(Debug, Clone)]
pub struct StaticHostProbe {
    pub stats: HostStats,
    pub fail: bool,
}

impl Default for StaticHostProbe {
    fn default() -> Self {
        Self {
            stats: HostStats { cpu_load_percent: 23.45, ram_used_gib: 6.12, ram_total_gib: 15.54 },
            fail: false,
        }
    }
}

impl StaticHostProbe {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }
}

#[async_trait::async_trait]
impl HostProbe for StaticHostProbe {
    async fn sample(&self) -> Result<HostStats, TelemetryError> {
        if self.fail {
            return Err(TelemetryError::HostStatsUnavailable("probe disabled".to_string()));
        }
        Ok(self.stats)
    }
}

/// [`ContainerRuntime`] listing a fixed set of running containers
#[derive(Debug, Clone, Default)]
pub struct StaticContainers {
    records: Vec<ContainerRecord>,
    fail: bool,
}

impl StaticContainers {
    pub fn named<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_states(names.into_iter().map(|name| (name, "running")))
    }

    /// Containers given as `(name, state)` pairs
    pub fn with_states<'a>(containers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let records = containers
            .into_iter()
            .map(|(name, state)| ContainerRecord {
                names: name.to_string(),
                state: state.to_string(),
            })
            .collect();
        Self { records, fail: false }
    }

    pub fn failing() -> Self {
        Self { records: Vec::new(), fail: true }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for StaticContainers {
    async fn list(&self) -> Result<Vec<ContainerRecord>, TelemetryError> {
        if self.fail {
            return Err(TelemetryError::Enumeration("docker: command not found".to_string()));
        }
        Ok(self.records.clone())
    }
}
