use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{GatewayConnection, GatewayConnector, LedgerConfig, LedgerError, LedgerTimeouts};
use crate::identity::IdentityStore;
use crate::metrics::{MetricsLedger, status_of};
use crate::profile::ConnectionProfile;

/// A connection bound to one channel and chaincode
///
/// The connection is released exactly once: by [`LedgerSession::close`], or on drop if the
/// session is abandoned (error path, panic, cancelled request).
pub struct LedgerSession {
    connection: Option<Box<dyn GatewayConnection>>,
    channel: String,
    chaincode: String,
    timeouts: LedgerTimeouts,
    metrics: MetricsLedger,
}

impl LedgerSession {
    pub fn new(
        connection: Box<dyn GatewayConnection>,
        channel: impl Into<String>,
        chaincode: impl Into<String>,
        timeouts: LedgerTimeouts,
        metrics: MetricsLedger,
    ) -> Self {
        Self {
            connection: Some(connection),
            channel: channel.into(),
            chaincode: chaincode.into(),
            timeouts,
            metrics,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    /// Query the ledger without creating a transaction
    #[tracing::instrument(
        skip(self, args),
        fields(operation = "ledger.evaluate", channel = %self.channel, chaincode = %self.chaincode)
    )]
    pub async fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, LedgerError> {
        let timer = self.metrics.evaluate();

        let result = bounded(
            "evaluate",
            self.timeouts.evaluate,
            self.connection()?.evaluate(&self.channel, &self.chaincode, function, args),
        )
        .await;

        timer.finish(status_of(&result));
        result
    }

    /// Submit a transaction and wait for it to be committed
    #[tracing::instrument(
        skip(self, args),
        fields(operation = "ledger.submit", channel = %self.channel, chaincode = %self.chaincode)
    )]
    pub async fn submit(&self, function: &str, args: &[String]) -> Result<Vec<u8>, LedgerError> {
        let timer = self.metrics.submit();

        let result = bounded(
            "submit",
            self.timeouts.submit_total(),
            self.connection()?.submit(&self.channel, &self.chaincode, function, args),
        )
        .await;

        timer.finish(status_of(&result));
        result
    }

    /// Release the connection
    pub fn close(mut self) {
        self.release();
    }

    fn connection(&self) -> Result<&dyn GatewayConnection, LedgerError> {
        self.connection
            .as_deref()
            .ok_or_else(|| LedgerError::ConnectFailed("session already closed".to_string()))
    }

    fn release(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            debug!(channel = %self.channel, chaincode = %self.chaincode, "Ledger session released");
        }
    }
}

impl Drop for LedgerSession {
    fn drop(&mut self) {
        self.release();
    }
}

async fn bounded<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, LedgerError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LedgerError::Timeout(format!("{operation} exceeded {limit:?}")))?
}

/// Source of ledger sessions
///
/// The default [`OnDemandSessions`] connects per call; a pooled implementation can be swapped
/// in without touching callers.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> crate::Result<LedgerSession>;
}

/// Opens a fresh gateway connection for every session
pub struct OnDemandSessions {
    identities: Arc<IdentityStore>,
    connector: Arc<dyn GatewayConnector>,
    config: LedgerConfig,
    metrics: MetricsLedger,
}

impl OnDemandSessions {
    pub fn new(
        identities: Arc<IdentityStore>,
        connector: Arc<dyn GatewayConnector>,
        config: LedgerConfig,
        metrics: MetricsLedger,
    ) -> Self {
        Self { identities, connector, config, metrics }
    }
}

#[async_trait::async_trait]
impl SessionFactory for OnDemandSessions {
    #[tracing::instrument(skip(self), fields(operation = "ledger.session.open"))]
    async fn open(&self) -> crate::Result<LedgerSession> {
        let identity = self.identities.app_identity().await?;
        let profile = ConnectionProfile::load(&self.config.profile_path).await?;

        let connection = bounded(
            "connect",
            self.config.timeouts.connect,
            self.connector.connect(&identity, &profile, self.config.discovery),
        )
        .await?;
        self.metrics.session_opened();

        Ok(LedgerSession::new(
            connection,
            self.config.channel.clone(),
            self.config.chaincode.clone(),
            self.config.timeouts,
            self.metrics.clone(),
        ))
    }
}

/// Run `op` against a freshly opened session, releasing it on every exit path
///
/// A panic inside `op` is re-raised after the session has been released.
pub async fn with_session<T, F>(factory: &dyn SessionFactory, op: F) -> crate::Result<T>
where
    F: for<'s> FnOnce(&'s LedgerSession) -> BoxFuture<'s, Result<T, LedgerError>>,
{
    let session = factory.open().await?;

    let outcome = AssertUnwindSafe(op(&session)).catch_unwind().await;
    session.close();

    match outcome {
        Ok(result) => result.map_err(Into::into),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
