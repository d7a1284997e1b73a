//! Recommendation engines.
//!
//! Three trainable models over the same interaction data:
//! - [`cf::CollaborativeFilteringEngine`]: k-NN over user rows or item
//!   columns of the weighted user-item matrix
//! - [`svd::MatrixFactorizationEngine`]: truncated SVD latent factors
//! - [`hybrid::HybridEngine`]: metadata-aware embeddings trained with
//!   BPR or logistic SGD
//!
//! All engines share the [`matrix::UserItemMatrix`] pivot (except the
//! hybrid engine, which consumes interactions directly), train on an
//! immutable snapshot of the data, and serialize their full trained state
//! to JSON. Unknown users and products yield empty results; querying an
//! untrained engine is an error the caller is expected to catch and route
//! to a fallback.

pub mod cf;
pub mod error;
pub mod hybrid;
pub mod knn;
pub mod matrix;
pub mod svd;
pub mod weighting;

pub use cf::CollaborativeFilteringEngine;
pub use error::{EngineError, Result};
pub use hybrid::{HybridConfig, HybridEngine, RankingLoss};
pub use matrix::UserItemMatrix;
pub use svd::MatrixFactorizationEngine;
pub use weighting::{interaction_weight, weighted_value};
