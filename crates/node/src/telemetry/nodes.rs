use rand::Rng;

use crate::types::{NodeInfo, NodeRole};

/// Name prefixes of the processes shown on the dashboard
///
/// Chaincode (`dev-peer…`) and tooling containers deliberately fall outside.
const ALLOWED_PREFIXES: [&str; 2] = ["peer0.org", "orderer"];

pub fn is_network_node(process_name: &str) -> bool {
    ALLOWED_PREFIXES.iter().any(|prefix| process_name.starts_with(prefix))
}

/// Role and display name derived from a process name
pub fn classify(process_name: &str) -> (NodeRole, String) {
    if process_name.contains("orderer") {
        (NodeRole::Orderer, "Orderer Authority".to_string())
    } else if process_name.contains("org1") {
        (NodeRole::PeerOrg1, "Org1 Peer".to_string())
    } else if process_name.contains("org2") {
        (NodeRole::PeerOrg2, "Org2 Peer".to_string())
    } else {
        (NodeRole::Node, process_name.to_string())
    }
}

/// Synthetic health indicator
///
/// Orderers score `100.0`. Everything else gets a display value in `[95.0, 98.0)` with one
/// decimal; it is not a measurement.
pub fn health_score<R: Rng + ?Sized>(role: NodeRole, rng: &mut R) -> f64 {
    match role {
        NodeRole::Orderer => 100.0,
        NodeRole::PeerOrg1 | NodeRole::PeerOrg2 | NodeRole::Node => {
            f64::from(rng.random_range(950..980_u32)) / 10.0
        },
    }
}

/// Allow-listed, classified and scored nodes, in input order
pub fn discover<'a, R: Rng + ?Sized>(
    process_names: impl IntoIterator<Item = &'a str>,
    rng: &mut R,
) -> Vec<NodeInfo> {
    process_names
        .into_iter()
        .filter(|name| is_network_node(name))
        .map(|name| {
            let (role, display_name) = classify(name);
            NodeInfo {
                process_name: name.to_string(),
                display_name,
                role,
                health_score: health_score(role, rng),
            }
        })
        .collect()
}
