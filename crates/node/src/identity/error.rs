use thiserror::Error;

/// Identity store error types
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The signing certificate could not be read
    #[error("Missing certificate: {0}")]
    MissingCertificate(String),

    /// No usable private key in the key store directory
    #[error("Missing private key: {0}")]
    MissingPrivateKey(String),

    /// The wallet rejected a new identity
    #[error("Wallet write failed: {0}")]
    RepositoryWriteFailed(String),

    /// A stored identity could not be read back
    #[error("Wallet read failed: {0}")]
    RepositoryReadFailed(String),

    /// The label cannot be used as a wallet entry name
    #[error("Invalid identity label: {0:?}")]
    InvalidLabel(String),
}
