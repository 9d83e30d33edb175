use fabric_dashboard_proto::Message;
use fabric_dashboard_proto::msp::SerializedIdentity;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};

use crate::identity::Identity;
use crate::ledger::LedgerError;

/// Signs gateway messages on behalf of an [`Identity`]
pub(crate) struct Signer {
    creator: Vec<u8>,
    key: SigningKey,
}

impl Signer {
    pub(crate) fn from_identity(identity: &Identity) -> Result<Self, LedgerError> {
        let secret = p256::SecretKey::from_pkcs8_pem(&identity.private_key)
            .or_else(|_| p256::SecretKey::from_sec1_pem(&identity.private_key))
            .map_err(|e| {
                LedgerError::Credentials(format!("private key of {}: {e}", identity.label))
            })?;

        let creator = SerializedIdentity {
            mspid: identity.msp_id.clone(),
            id_bytes: identity.certificate.clone().into_bytes(),
        }
        .encode_to_vec();

        Ok(Self { creator, key: SigningKey::from(secret) })
    }

    /// Serialized identity embedded in signature headers
    pub(crate) fn creator(&self) -> &[u8] {
        &self.creator
    }

    /// DER-encoded ECDSA signature over the SHA-256 digest of `message`, with low S
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let digest = Sha256::digest(message);
        let signature: Signature = self
            .key
            .sign_prehash(&digest)
            .map_err(|e| LedgerError::Credentials(format!("signing failed: {e}")))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        Ok(signature.to_der().as_bytes().to_vec())
    }
}
