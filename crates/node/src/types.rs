use serde::{Deserialize, Deserializer, Serialize};

/// Asset fields passed verbatim to the chaincode `CreateAsset` transaction
///
/// All fields are required and untyped; the chaincode owns their semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub color: String,
    pub size: String,
    pub owner: String,
    pub value: String,
}

impl AssetRecord {
    /// Chaincode arguments, in `CreateAsset` order
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.color.clone(),
            self.size.clone(),
            self.owner.clone(),
            self.value.clone(),
        ]
    }
}

/// Reply to a successful `CreateAsset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAssetResponse {
    pub message: String,
}

impl CreateAssetResponse {
    pub fn success() -> Self {
        Self { message: "Success".to_string() }
    }
}

/// Role of a discovered network participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    #[serde(rename = "Peer-Org1")]
    PeerOrg1,
    #[serde(rename = "Peer-Org2")]
    PeerOrg2,
    Orderer,
    Node,
}

/// A live network participant as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Raw process (container) name
    #[serde(rename = "id")]
    pub process_name: String,
    /// Human-readable name
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "type")]
    pub role: NodeRole,
    /// Synthetic health indicator in `0.0..=100.0`
    #[serde(rename = "score")]
    pub health_score: f64,
}

/// Point-in-time host resource usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostStats {
    pub cpu_load_percent: f64,
    pub ram_used_gib: f64,
    pub ram_total_gib: f64,
}

/// Telemetry snapshot returned by `GetStats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub cpu: f64,
    pub ram_used: f64,
    pub ram_total: f64,
    pub node_count: usize,
    pub peers: Vec<NodeInfo>,
}

impl ClusterStats {
    pub fn new(host: HostStats, peers: Vec<NodeInfo>) -> Self {
        Self {
            cpu: host.cpu_load_percent,
            ram_used: host.ram_used_gib,
            ram_total: host.ram_total_gib,
            node_count: peers.len(),
            peers,
        }
    }
}

/// Outcome of one interaction with a network node
///
/// Omitted fields default to node `"0"`, a failed interaction and distance `1`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReputationUpdate {
    /// Node identifier; JSON numbers are accepted and kept in their decimal form
    #[serde(default = "default_node_id", deserialize_with = "node_id_text")]
    pub node_id: String,
    #[serde(default)]
    pub success: bool,
    /// Network distance to the node, in hops
    #[serde(default = "default_distance")]
    pub distance: f64,
}

fn default_node_id() -> String {
    "0".to_string()
}

fn default_distance() -> f64 {
    1.0
}

fn node_id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NodeId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match NodeId::deserialize(deserializer)? {
        NodeId::Text(text) => text,
        NodeId::Number(number) => number.to_string(),
    })
}

/// Reply to a reputation update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationScore {
    pub new_score: f64,
}

/// Rounds to a fixed number of decimal places
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
