mod filesystem;
mod memory;

use serde::{Deserialize, Serialize};

pub use self::filesystem::FileSystemWallet;
pub use self::memory::InMemoryWallet;
use super::{Identity, IdentityError};

/// Persistent identity repository
#[async_trait::async_trait]
pub trait Wallet: Send + Sync {
    /// Fetch the identity stored under `label`, if any
    async fn get(&self, label: &str) -> Result<Option<Identity>, IdentityError>;

    /// Store an identity under its own label
    async fn put(&self, identity: &Identity) -> Result<(), IdentityError>;

    /// Labels of all stored identities, sorted
    async fn list(&self) -> Result<Vec<String>, IdentityError>;
}

const X509_IDENTITY_TYPE: &str = "X.509";

/// On-disk representation of an X.509 identity
///
/// Same layout as the file-system wallets written by the Fabric SDKs, so existing wallet
/// directories can be reused.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WalletEntry {
    credentials: Credentials,
    msp_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "default_version")]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    certificate: String,
    private_key: String,
}

fn default_version() -> u32 {
    1
}

impl WalletEntry {
    pub(crate) fn into_identity(self, label: &str) -> Result<Identity, IdentityError> {
        if self.kind != X509_IDENTITY_TYPE {
            return Err(IdentityError::RepositoryReadFailed(format!(
                "identity {label} has unsupported type {}",
                self.kind
            )));
        }
        Ok(Identity {
            label: label.to_string(),
            msp_id: self.msp_id,
            certificate: self.credentials.certificate,
            private_key: self.credentials.private_key,
        })
    }
}

impl From<&Identity> for WalletEntry {
    fn from(identity: &Identity) -> Self {
        Self {
            credentials: Credentials {
                certificate: identity.certificate.clone(),
                private_key: identity.private_key.clone(),
            },
            msp_id: identity.msp_id.clone(),
            kind: X509_IDENTITY_TYPE.to_string(),
            version: default_version(),
        }
    }
}
