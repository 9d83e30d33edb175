use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::Wallet;
use crate::identity::{Identity, IdentityError};

/// Non-persistent wallet, useful for tests and short-lived tools
#[derive(Default)]
pub struct InMemoryWallet {
    entries: RwLock<BTreeMap<String, Identity>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Wallet for InMemoryWallet {
    async fn get(&self, label: &str) -> Result<Option<Identity>, IdentityError> {
        Ok(self.entries.read().await.get(label).cloned())
    }

    async fn put(&self, identity: &Identity) -> Result<(), IdentityError> {
        self.entries.write().await.insert(identity.label.clone(), identity.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, IdentityError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
