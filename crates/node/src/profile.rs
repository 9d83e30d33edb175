//! Fabric connection profiles ("common connection profile" documents).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Connection profile error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document (or a file it references) could not be read
    #[error("Read error: {0}")]
    Read(String),

    /// The document is not valid YAML/JSON of the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Network topology and trust roots as seen by one client organization
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client: Client,
    #[serde(default)]
    pub organizations: BTreeMap<String, Organization>,
    #[serde(default)]
    pub peers: BTreeMap<String, Endpoint>,
    #[serde(default)]
    pub orderers: BTreeMap<String, Endpoint>,
    #[serde(default)]
    pub certificate_authorities: BTreeMap<String, Endpoint>,
    #[serde(default)]
    pub channels: BTreeMap<String, Channel>,
    /// Directory relative file references are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Client {
    /// Organization the client belongs to
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default)]
    pub certificate_authorities: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub orderers: Vec<String>,
    #[serde(default)]
    pub peers: BTreeMap<String, serde_json::Value>,
}

/// A reachable peer, orderer or CA
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub url: String,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: Option<TlsCaCerts>,
    #[serde(default)]
    pub grpc_options: BTreeMap<String, serde_json::Value>,
}

/// Trust anchors, inline or by file reference
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsCaCerts {
    #[serde(default)]
    pub pem: Option<PemList>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PemList {
    One(String),
    Many(Vec<String>),
}

impl ConnectionProfile {
    /// Load a profile from disk
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    #[tracing::instrument(fields(operation = "profile.load"))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let mut profile = if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
        .map_err(|e| match e {
            ConfigError::Parse(msg) => ConfigError::Parse(format!("{}: {msg}", path.display())),
            other => other,
        })?;

        profile.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(profile)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Peer the client should open its gateway connection to
    ///
    /// The first peer of the client organization, falling back to the first peer overall.
    pub fn gateway_peer(&self) -> Option<(&str, &Endpoint)> {
        let org_peers = self
            .client
            .organization
            .as_ref()
            .and_then(|org| self.organizations.get(org))
            .map(|org| org.peers.as_slice())
            .unwrap_or_default();

        org_peers
            .iter()
            .find_map(|name| self.peers.get_key_value(name))
            .or_else(|| self.peers.iter().next())
            .map(|(name, endpoint)| (name.as_str(), endpoint))
    }

    /// MSP IDs of the organizations expected to endorse on `channel`
    ///
    /// Organizations owning a peer of the channel when the channel is described, otherwise every
    /// organization in the profile.
    pub fn endorsing_msp_ids(&self, channel: &str) -> Vec<String> {
        let channel_peers = self.channels.get(channel).map(|c| &c.peers);

        let mut msp_ids: Vec<String> = self
            .organizations
            .values()
            .filter(|org| match channel_peers {
                Some(peers) => org.peers.iter().any(|peer| peers.contains_key(peer)),
                None => true,
            })
            .map(|org| org.mspid.clone())
            .collect();
        msp_ids.sort();
        msp_ids.dedup();

        msp_ids
    }

    /// Resolve the PEM trust anchors of an endpoint
    pub async fn tls_ca_pems(&self, endpoint: &Endpoint) -> Result<Vec<String>, ConfigError> {
        let Some(certs) = &endpoint.tls_ca_certs else {
            return Ok(Vec::new());
        };

        let mut pems = match &certs.pem {
            Some(PemList::One(pem)) => vec![pem.clone()],
            Some(PemList::Many(pems)) => pems.clone(),
            None => Vec::new(),
        };
        if let Some(path) = &certs.path {
            let path = self.base_dir.join(path);
            let pem = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
            pems.push(pem);
        }

        Ok(pems)
    }
}

impl Endpoint {
    /// TLS server name to verify, when it differs from the URL host
    pub fn tls_domain(&self) -> Option<&str> {
        ["ssl-target-name-override", "hostnameOverride"]
            .iter()
            .find_map(|key| self.grpc_options.get(*key).and_then(serde_json::Value::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_NETWORK_ORG1: &str = r"---
name: test-network-org1
version: 1.0.0
client:
  organization: Org1
  connection:
    timeout:
      peer:
        endorser: '300'
organizations:
  Org1:
    mspid: Org1MSP
    peers:
    - peer0.org1.example.com
    certificateAuthorities:
    - ca.org1.example.com
peers:
  peer0.org1.example.com:
    url: grpcs://localhost:7051
    tlsCACerts:
      pem: |
          -----BEGIN CERTIFICATE-----
          MIICJzCCAc2gAwIBAgIUTEST
          -----END CERTIFICATE-----
    grpcOptions:
      ssl-target-name-override: peer0.org1.example.com
      hostnameOverride: peer0.org1.example.com
certificateAuthorities:
  ca.org1.example.com:
    url: https://localhost:7054
    caName: ca-org1
    tlsCACerts:
      pem:
        - |
          -----BEGIN CERTIFICATE-----
          MIICUTCCAfegAwIBAgIUTEST
          -----END CERTIFICATE-----
    httpOptions:
      verify: false
";

    #[tokio::test]
    async fn test_parse_test_network_profile() {
        let profile = ConnectionProfile::from_yaml(TEST_NETWORK_ORG1).unwrap();

        assert_eq!(profile.name, "test-network-org1");
        assert_eq!(profile.client.organization.as_deref(), Some("Org1"));
        assert_eq!(profile.organizations["Org1"].mspid, "Org1MSP");
        assert_eq!(profile.organizations["Org1"].certificate_authorities, ["ca.org1.example.com"]);

        let (name, peer) = profile.gateway_peer().unwrap();
        assert_eq!(name, "peer0.org1.example.com");
        assert_eq!(peer.url, "grpcs://localhost:7051");
        assert_eq!(peer.tls_domain(), Some("peer0.org1.example.com"));

        let peer_pems = profile.tls_ca_pems(peer).await.unwrap();
        assert_eq!(peer_pems.len(), 1);
        assert!(peer_pems[0].starts_with("-----BEGIN CERTIFICATE-----"));

        let ca = &profile.certificate_authorities["ca.org1.example.com"];
        assert_eq!(profile.tls_ca_pems(ca).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_parse_json_profile() {
        let json = r#"{
            "name": "json-network",
            "organizations": {"Org2": {"mspid": "Org2MSP", "peers": ["peer0.org2.example.com"]}},
            "peers": {"peer0.org2.example.com": {"url": "grpc://localhost:9051"}}
        }"#;
        let profile = ConnectionProfile::from_json(json).unwrap();

        let (name, peer) = profile.gateway_peer().unwrap();
        assert_eq!(name, "peer0.org2.example.com");
        assert_eq!(peer.tls_domain(), None);
        assert!(profile.tls_ca_pems(peer).await.unwrap().is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let err = ConnectionProfile::from_yaml("peers: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_endorsing_msp_ids() {
        let yaml = r"
organizations:
  Org1: {mspid: Org1MSP, peers: [peer0.org1.example.com]}
  Org2: {mspid: Org2MSP, peers: [peer0.org2.example.com]}
  Org3: {mspid: Org3MSP, peers: [peer0.org3.example.com]}
channels:
  mychannel:
    peers:
      peer0.org1.example.com: {}
      peer0.org2.example.com: {}
";
        let profile = ConnectionProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.endorsing_msp_ids("mychannel"), ["Org1MSP", "Org2MSP"]);
        assert_eq!(profile.endorsing_msp_ids("other"), ["Org1MSP", "Org2MSP", "Org3MSP"]);
    }

    #[tokio::test]
    async fn test_load_resolves_relative_ca_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ca.pem"), "-----BEGIN CERTIFICATE-----\n").unwrap();
        let profile_path = dir.path().join("connection.yaml");
        std::fs::write(
            &profile_path,
            "peers:\n  peer0:\n    url: grpcs://localhost:7051\n    tlsCACerts:\n      path: ca.pem\n",
        )
        .unwrap();

        let profile = ConnectionProfile::load(&profile_path).await.unwrap();
        let (_, peer) = profile.gateway_peer().unwrap();
        assert_eq!(profile.tls_ca_pems(peer).await.unwrap(), ["-----BEGIN CERTIFICATE-----\n"]);
    }

    #[tokio::test]
    async fn test_missing_ca_file() {
        let profile = ConnectionProfile::from_yaml(
            "peers:\n  peer0:\n    url: grpcs://localhost:7051\n    tlsCACerts:\n      path: /nonexistent/ca.pem\n",
        )
        .unwrap();

        let (_, peer) = profile.gateway_peer().unwrap();
        let err = profile.tls_ca_pems(peer).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read(msg) if msg.contains("/nonexistent/ca.pem")));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionProfile::load(&dir.path().join("missing.yaml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
