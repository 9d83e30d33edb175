use std::io::ErrorKind;
use std::path::PathBuf;

use super::{Wallet, WalletEntry};
use crate::identity::{Identity, IdentityError};

const ENTRY_EXTENSION: &str = "id";

/// Wallet backed by a directory of `<label>.id` JSON files
pub struct FileSystemWallet {
    dir: PathBuf,
}

impl FileSystemWallet {
    /// Wallet rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.{ENTRY_EXTENSION}"))
    }

    fn write_failed(&self, e: &dyn std::fmt::Display) -> IdentityError {
        IdentityError::RepositoryWriteFailed(format!("{}: {e}", self.dir.display()))
    }
}

#[async_trait::async_trait]
impl Wallet for FileSystemWallet {
    async fn get(&self, label: &str) -> Result<Option<Identity>, IdentityError> {
        let path = self.entry_path(label);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IdentityError::RepositoryReadFailed(format!(
                    "{}: {e}",
                    path.display()
                )));
            },
        };

        let entry: WalletEntry = serde_json::from_slice(&bytes).map_err(|e| {
            IdentityError::RepositoryReadFailed(format!("{}: {e}", path.display()))
        })?;
        entry.into_identity(label).map(Some)
    }

    async fn put(&self, identity: &Identity) -> Result<(), IdentityError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| self.write_failed(&e))?;

        let bytes =
            serde_json::to_vec(&WalletEntry::from(identity)).map_err(|e| self.write_failed(&e))?;

        // Readers must never observe a half-written entry
        let tmp = self.dir.join(format!(".{}.{ENTRY_EXTENSION}.tmp", identity.label));
        tokio::fs::write(&tmp, bytes).await.map_err(|e| self.write_failed(&e))?;
        tokio::fs::rename(&tmp, self.entry_path(&identity.label))
            .await
            .map_err(|e| self.write_failed(&e))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, IdentityError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(IdentityError::RepositoryReadFailed(format!(
                    "{}: {e}",
                    self.dir.display()
                )));
            },
        };

        let mut labels = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            IdentityError::RepositoryReadFailed(format!("{}: {e}", self.dir.display()))
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(label) = path.file_stem().and_then(|stem| stem.to_str()) {
                labels.push(label.to_string());
            }
        }
        labels.sort();

        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_identity;

    #[tokio::test]
    async fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = FileSystemWallet::new(dir.path().join("wallet"));

        assert!(wallet.get("appUser").await.unwrap().is_none());
        assert!(wallet.list().await.unwrap().is_empty());

        let identity = test_identity("appUser");
        wallet.put(&identity).await.unwrap();

        assert_eq!(wallet.get("appUser").await.unwrap(), Some(identity));
        assert_eq!(wallet.list().await.unwrap(), vec!["appUser".to_string()]);
    }

    #[tokio::test]
    async fn test_entry_uses_sdk_wallet_layout() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = FileSystemWallet::new(dir.path());
        wallet.put(&test_identity("appUser")).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("appUser.id")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["mspId"], "Org1MSP");
        assert_eq!(json["type"], "X.509");
        assert_eq!(json["version"], 1);
        assert!(json["credentials"]["certificate"].as_str().unwrap().contains("CERTIFICATE"));
        assert!(json["credentials"]["privateKey"].as_str().unwrap().contains("PRIVATE KEY"));
    }

    #[tokio::test]
    async fn test_reads_entry_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("admin.id"),
            r#"{"credentials":{"certificate":"cert","privateKey":"key"},"mspId":"Org2MSP","type":"X.509"}"#,
        )
        .unwrap();

        let identity = FileSystemWallet::new(dir.path()).get("admin").await.unwrap().unwrap();
        assert_eq!(identity.label, "admin");
        assert_eq!(identity.msp_id, "Org2MSP");
        assert_eq!(identity.certificate, "cert");
        assert_eq!(identity.private_key, "key");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("appUser.id"), "not json").unwrap();

        let err = FileSystemWallet::new(dir.path()).get("appUser").await.unwrap_err();
        assert!(matches!(err, IdentityError::RepositoryReadFailed(_)));
    }

    #[tokio::test]
    async fn test_put_into_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the wallet directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let err = FileSystemWallet::new(blocker.join("wallet"))
            .put(&test_identity("appUser"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::RepositoryWriteFailed(_)));
    }

    #[tokio::test]
    async fn test_non_x509_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hsm.id"),
            r#"{"credentials":{"certificate":"c","privateKey":"k"},"mspId":"Org1MSP","type":"HSM-X.509"}"#,
        )
        .unwrap();

        let err = FileSystemWallet::new(dir.path()).get("hsm").await.unwrap_err();
        assert!(matches!(err, IdentityError::RepositoryReadFailed(_)));
    }
}
