mod error;
mod wallet;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use self::error::IdentityError;
pub use self::wallet::{FileSystemWallet, InMemoryWallet, Wallet};

/// Suffix of private key files in an MSP `keystore` directory
const PRIVATE_KEY_SUFFIX: &str = "_sk";

/// X.509 signing identity of an application user
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Wallet label
    pub label: String,
    /// Membership service provider ID
    pub msp_id: String,
    /// PEM-encoded certificate
    pub certificate: String,
    /// PEM-encoded private key
    pub private_key: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("label", &self.label)
            .field("msp_id", &self.msp_id)
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// [`IdentityStore`] configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Label of the application user
    pub label: String,
    /// MSP ID assigned to newly created identities
    pub msp_id: String,
    /// Wallet directory
    pub wallet_dir: PathBuf,
    /// Signing certificate of the user
    pub certificate_path: PathBuf,
    /// MSP `keystore` directory holding the user's private key
    pub key_store_dir: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        let msp = home.join(
            "fabric-samples/test-network/organizations/peerOrganizations/org1.example.com/users/User1@org1.example.com/msp",
        );
        Self {
            label: "appUser".to_string(),
            msp_id: "Org1MSP".to_string(),
            wallet_dir: PathBuf::from("wallet"),
            certificate_path: msp.join("signcerts/cert.pem"),
            key_store_dir: msp.join("keystore"),
        }
    }
}

/// Resolves signing identities, creating them lazily from MSP key material
///
/// Identities are looked up in an in-process cache, then in the [`Wallet`]. Only when both miss
/// is the key material read from disk and the new identity persisted. The whole sequence runs
/// under a lock so concurrent first requests create the identity exactly once.
pub struct IdentityStore {
    config: IdentityConfig,
    wallet: Box<dyn Wallet>,
    cache: Mutex<HashMap<String, Arc<Identity>>>,
}

impl IdentityStore {
    pub fn new(config: IdentityConfig, wallet: Box<dyn Wallet>) -> Self {
        Self { config, wallet, cache: Mutex::new(HashMap::new()) }
    }

    /// Store backed by a [`FileSystemWallet`] at the configured wallet directory
    pub fn with_file_system_wallet(config: IdentityConfig) -> Self {
        let wallet = FileSystemWallet::new(config.wallet_dir.clone());
        Self::new(config, Box::new(wallet))
    }

    /// Identity of the configured application user
    pub async fn app_identity(&self) -> Result<Arc<Identity>, IdentityError> {
        self.get_or_create(&self.config.label).await
    }

    /// Get the identity stored under `label`, creating and persisting it on first use
    #[tracing::instrument(skip(self), fields(operation = "identity.get_or_create"))]
    pub async fn get_or_create(&self, label: &str) -> Result<Arc<Identity>, IdentityError> {
        validate_label(label)?;

        let mut cache = self.cache.lock().await;
        if let Some(identity) = cache.get(label) {
            return Ok(identity.clone());
        }

        let identity = if let Some(identity) = self.wallet.get(label).await? {
            debug!("Loaded identity from wallet");
            identity
        } else {
            let identity = self.identity_from_key_material(label).await?;
            self.wallet.put(&identity).await?;
            info!(msp_id = %identity.msp_id, "Stored new identity in wallet");
            identity
        };

        let identity = Arc::new(identity);
        cache.insert(label.to_string(), identity.clone());

        Ok(identity)
    }

    async fn identity_from_key_material(&self, label: &str) -> Result<Identity, IdentityError> {
        let certificate =
            tokio::fs::read_to_string(&self.config.certificate_path).await.map_err(|e| {
                IdentityError::MissingCertificate(format!(
                    "{}: {e}",
                    self.config.certificate_path.display()
                ))
            })?;

        let key_path = select_private_key(&self.config.key_store_dir).await?;
        let private_key = tokio::fs::read_to_string(&key_path).await.map_err(|e| {
            IdentityError::MissingPrivateKey(format!("{}: {e}", key_path.display()))
        })?;

        Ok(Identity {
            label: label.to_string(),
            msp_id: self.config.msp_id.clone(),
            certificate,
            private_key,
        })
    }
}

fn validate_label(label: &str) -> Result<(), IdentityError> {
    if label.is_empty() || label.contains(['/', '\\']) || label.starts_with('.') {
        return Err(IdentityError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// Pick the private key file from an MSP key store
///
/// Candidates are regular files named `*_sk`. When several exist the lexicographically first
/// one is used and the rest are reported, so the choice never depends on directory order.
pub(crate) async fn select_private_key(dir: &Path) -> Result<PathBuf, IdentityError> {
    let read_err =
        |e: std::io::Error| IdentityError::MissingPrivateKey(format!("{}: {e}", dir.display()));

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
            continue;
        };
        if !name.ends_with(PRIVATE_KEY_SUFFIX) {
            continue;
        }
        if tokio::fs::metadata(entry.path()).await.is_ok_and(|meta| meta.is_file()) {
            candidates.push(name);
        }
    }
    candidates.sort();

    let Some(chosen) = candidates.first() else {
        return Err(IdentityError::MissingPrivateKey(format!(
            "no *{PRIVATE_KEY_SUFFIX} file in {}",
            dir.display()
        )));
    };
    if candidates.len() > 1 {
        warn!(
            chosen = %chosen,
            ignored = ?&candidates[1..],
            "Multiple private keys in key store, using the lexicographically first"
        );
    }

    Ok(dir.join(chosen))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::{TEST_MSP_ID, write_key_material};

    #[tokio::test]
    async fn test_creates_identity_from_key_material() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        let store = IdentityStore::with_file_system_wallet(config.clone());

        let identity = store.app_identity().await.unwrap();
        assert_eq!(identity.label, "appUser");
        assert_eq!(identity.msp_id, TEST_MSP_ID);
        assert_eq!(identity.certificate, std::fs::read_to_string(&config.certificate_path).unwrap());
        assert!(identity.private_key.contains("BEGIN PRIVATE KEY"));
        assert!(config.wallet_dir.join("appUser.id").exists());
    }

    #[tokio::test]
    async fn test_second_call_does_not_touch_key_material() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        let store = IdentityStore::new(config.clone(), Box::new(InMemoryWallet::new()));

        let first = store.get_or_create("appUser").await.unwrap();

        std::fs::remove_file(&config.certificate_path).unwrap();
        std::fs::remove_dir_all(&config.key_store_dir).unwrap();

        let second = store.get_or_create("appUser").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_identity_survives_restart_through_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        let created = IdentityStore::with_file_system_wallet(config.clone())
            .app_identity()
            .await
            .unwrap();

        std::fs::remove_dir_all(&config.key_store_dir).unwrap();

        let reloaded = IdentityStore::with_file_system_wallet(config).app_identity().await.unwrap();
        assert_eq!(*created, *reloaded);
    }

    #[tokio::test]
    async fn test_missing_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        std::fs::remove_file(&config.certificate_path).unwrap();

        let store = IdentityStore::with_file_system_wallet(config.clone());
        let err = store.app_identity().await.unwrap_err();
        assert!(matches!(err, IdentityError::MissingCertificate(_)));
        assert!(!config.wallet_dir.join("appUser.id").exists());
    }

    #[tokio::test]
    async fn test_missing_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        for entry in std::fs::read_dir(&config.key_store_dir).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }
        std::fs::write(config.key_store_dir.join("README"), "not a key").unwrap();

        let store = IdentityStore::with_file_system_wallet(config);
        let err = store.app_identity().await.unwrap_err();
        assert!(matches!(err, IdentityError::MissingPrivateKey(_)));
    }

    #[tokio::test]
    async fn test_missing_key_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_key_material(dir.path());
        std::fs::remove_dir_all(&config.key_store_dir).unwrap();

        let err = select_private_key(&config.key_store_dir).await.unwrap_err();
        assert!(matches!(err, IdentityError::MissingPrivateKey(_)));
    }

    #[tokio::test]
    async fn test_multiple_keys_pick_lexicographically_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bbbb_sk"), "b").unwrap();
        std::fs::write(dir.path().join("aaaa_sk"), "a").unwrap();
        std::fs::write(dir.path().join("0000_pk"), "not a private key").unwrap();
        std::fs::create_dir(dir.path().join("0000_sk")).unwrap();

        let chosen = select_private_key(dir.path()).await.unwrap();
        assert_eq!(chosen, dir.path().join("aaaa_sk"));
    }

    #[tokio::test]
    async fn test_invalid_labels() {
        let store = IdentityStore::new(IdentityConfig::default(), Box::new(InMemoryWallet::new()));
        for label in ["", "../appUser", "a/b", "a\\b", ".hidden"] {
            let err = store.get_or_create(label).await.unwrap_err();
            assert!(matches!(err, IdentityError::InvalidLabel(_)), "label {label:?}");
        }
    }

    #[tokio::test]
    async fn test_debug_redacts_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::with_file_system_wallet(write_key_material(dir.path()));
        let identity = store.app_identity().await.unwrap();

        let printed = format!("{identity:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("BEGIN PRIVATE KEY"));
    }

    /// Counts writes reaching the wallet
    struct CountingWallet {
        inner: InMemoryWallet,
        puts: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Wallet for CountingWallet {
        async fn get(&self, label: &str) -> Result<Option<Identity>, IdentityError> {
            self.inner.get(label).await
        }

        async fn put(&self, identity: &Identity) -> Result<(), IdentityError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            // Widen the race window between check and write
            tokio::task::yield_now().await;
            self.inner.put(identity).await
        }

        async fn list(&self) -> Result<Vec<String>, IdentityError> {
            self.inner.list().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let puts = Arc::new(AtomicUsize::new(0));
        let wallet = CountingWallet { inner: InMemoryWallet::new(), puts: puts.clone() };
        let store = Arc::new(IdentityStore::new(write_key_material(dir.path()), Box::new(wallet)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.app_identity().await })
            })
            .collect();

        let mut identities = Vec::new();
        for handle in handles {
            identities.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(puts.load(Ordering::SeqCst), 1);
        assert!(identities.iter().all(|identity| Arc::ptr_eq(identity, &identities[0])));
    }

    struct ReadOnlyWallet;

    #[async_trait::async_trait]
    impl Wallet for ReadOnlyWallet {
        async fn get(&self, _label: &str) -> Result<Option<Identity>, IdentityError> {
            Ok(None)
        }

        async fn put(&self, _identity: &Identity) -> Result<(), IdentityError> {
            Err(IdentityError::RepositoryWriteFailed("read-only".to_string()))
        }

        async fn list(&self) -> Result<Vec<String>, IdentityError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_wallet_write_failure_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(write_key_material(dir.path()), Box::new(ReadOnlyWallet));

        for _ in 0..2 {
            let err = store.app_identity().await.unwrap_err();
            assert!(matches!(err, IdentityError::RepositoryWriteFailed(_)));
        }
    }
}
