use super::{DiscoveryOptions, LedgerError};
use crate::identity::Identity;
use crate::profile::ConnectionProfile;

/// Opens connections to the ledger network
#[async_trait::async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(
        &self,
        identity: &Identity,
        profile: &ConnectionProfile,
        discovery: DiscoveryOptions,
    ) -> Result<Box<dyn GatewayConnection>, LedgerError>;
}

/// An open connection to a gateway peer
#[async_trait::async_trait]
pub trait GatewayConnection: Send + Sync {
    /// Run a read-only chaincode function and return its result
    async fn evaluate(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError>;

    /// Endorse, order and commit a transaction, returning the chaincode result once committed
    async fn submit(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError>;

    /// Release the underlying network resources
    ///
    /// Called exactly once per connection; later calls on the connection fail.
    fn close(&mut self);
}
