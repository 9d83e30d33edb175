use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;
use tracing::info;

use super::TelemetryError;
use crate::types::ReputationUpdate;

/// Score of a node that has no recorded interactions
pub const INITIAL_SCORE: f64 = 50.0;
pub const MAX_SCORE: f64 = 100.0;

const REWARD: f64 = 5.0;
const PENALTY: f64 = 2.0;

/// Apply one interaction outcome to a score
///
/// Reliability grows exponentially with the current score (`e^(score/100)`), so well reputed
/// nodes gain more from a success and lose more from a failure. Successes over longer
/// distances weigh less, by `1 / (1 + log10(distance + 1))`. The result is clamped to
/// `[0, MAX_SCORE]`.
pub fn next_score(current: f64, success: bool, distance: f64) -> f64 {
    let reliability = (current / 100.0).exp();

    let next = if success {
        let gradient = 1.0 / (1.0 + (distance + 1.0).log10());
        current + REWARD * gradient * (1.0 + reliability / 10.0)
    } else {
        current - PENALTY * reliability
    };

    next.clamp(0.0, MAX_SCORE)
}

/// In-memory reputation of network nodes, keyed by node id
#[derive(Debug, Default)]
pub struct ReputationStore {
    scores: RwLock<HashMap<String, f64>>,
}

impl ReputationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction and return the node's new score
    ///
    /// Fails if the distance is negative or not finite.
    pub async fn update(&self, update: &ReputationUpdate) -> Result<f64, TelemetryError> {
        if !update.distance.is_finite() || update.distance < 0.0 {
            return Err(TelemetryError::InvalidReputationUpdate(format!(
                "distance must be a non-negative number, got {}",
                update.distance
            )));
        }

        let mut scores = self.scores.write().await;
        let current = scores.get(&update.node_id).copied().unwrap_or(INITIAL_SCORE);
        let score = next_score(current, update.success, update.distance);
        scores.insert(update.node_id.clone(), score);

        info!(
            node_id = %update.node_id,
            success = update.success,
            distance = update.distance,
            previous = current,
            score,
            "Reputation updated"
        );
        Ok(score)
    }

    /// Current scores of every node seen so far
    pub async fn scores(&self) -> BTreeMap<String, f64> {
        self.scores.read().await.iter().map(|(id, score)| (id.clone(), *score)).collect()
    }
}
