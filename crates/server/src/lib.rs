//! Serving layer for the recommendation subsystem.
//!
//! The orchestrator owns the trained model snapshot, the serving policy
//! (algorithm dispatch, fallback chain, context boosts, caching), and the
//! training lifecycle (retrain policy, timeouts, persistence).

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod snapshot;
pub mod types;

pub use cache::{Cache, MemoryCache, NoopCache};
pub use config::RecommenderConfig;
pub use orchestrator::RecommendationOrchestrator;
pub use snapshot::ModelSnapshot;
pub use types::{
    Algorithm, RecommendationRequest, RecommendationResponse, RecommendedItem, Target,
};
