//! Service configuration.

use engines::HybridConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requested result counts are clamped into this range.
pub const MIN_RECOMMENDATIONS: usize = 1;
pub const MAX_RECOMMENDATIONS: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Neighborhood size for the collaborative engines.
    pub knn_neighbors: usize,
    /// Latent factor count for matrix factorization.
    pub svd_factors: usize,
    /// Hybrid SGD hyperparameters.
    pub hybrid: HybridConfig,

    /// Models older than this are due for retraining.
    pub retrain_interval_secs: u64,
    /// Hard ceiling on a single training run.
    pub training_timeout_secs: u64,

    // Cache TTLs; trending shifts fastest, similar-items slowest.
    pub trending_ttl_secs: u64,
    pub personalized_ttl_secs: u64,
    pub similar_ttl_secs: u64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            knn_neighbors: 20,
            svd_factors: 50,
            hybrid: HybridConfig::default(),
            retrain_interval_secs: 86_400,
            training_timeout_secs: 600,
            trending_ttl_secs: 300,
            personalized_ttl_secs: 3_600,
            similar_ttl_secs: 7_200,
        }
    }
}

impl RecommenderConfig {
    /// Clamp a requested result count into the supported range.
    pub fn clamp_n(&self, n: usize) -> usize {
        n.clamp(MIN_RECOMMENDATIONS, MAX_RECOMMENDATIONS)
    }

    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }

    pub fn training_timeout(&self) -> Duration {
        Duration::from_secs(self.training_timeout_secs)
    }
}
