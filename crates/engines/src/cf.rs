//! Collaborative filtering engine.
//!
//! k-NN similarity over the user-item matrix, in two orientations:
//! user-based (similar users' ratings, similarity-weighted) and item-based
//! (similar item columns). The two orientations train independently on the
//! same matrix. A basket mode accumulates item-based similarity across all
//! products in a basket.

use crate::error::{EngineError, Result};
use crate::knn::NearestNeighbors;
use crate::matrix::UserItemMatrix;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use store::ProductId;
use tracing::{debug, instrument};

const ENGINE_USER: &str = "user-based collaborative filtering";
const ENGINE_ITEM: &str = "item-based collaborative filtering";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeFilteringEngine {
    n_neighbors: usize,
    matrix: Option<UserItemMatrix>,
    user_model: Option<NearestNeighbors>,
    item_model: Option<NearestNeighbors>,
    trained_at: Option<DateTime<Utc>>,
}

impl CollaborativeFilteringEngine {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            matrix: None,
            user_model: None,
            item_model: None,
            trained_at: None,
        }
    }

    pub fn is_user_trained(&self) -> bool {
        self.user_model.is_some()
    }

    pub fn is_item_trained(&self) -> bool {
        self.item_model.is_some()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    /// Fit the k-NN index over user row vectors.
    pub fn train_user_based(&mut self, matrix: &UserItemMatrix) -> Result<()> {
        if matrix.is_empty() {
            return Err(EngineError::invalid_config(
                "cannot train collaborative filtering on an empty matrix",
            ));
        }
        self.user_model = Some(NearestNeighbors::fit(
            matrix.values().clone(),
            self.n_neighbors.min(matrix.n_users()),
        ));
        self.matrix = Some(matrix.clone());
        self.trained_at = Some(Utc::now());
        debug!("Trained user-based k-NN over {} users", matrix.n_users());
        Ok(())
    }

    /// Fit the k-NN index over item column vectors.
    pub fn train_item_based(&mut self, matrix: &UserItemMatrix) -> Result<()> {
        if matrix.is_empty() {
            return Err(EngineError::invalid_config(
                "cannot train collaborative filtering on an empty matrix",
            ));
        }
        self.item_model = Some(NearestNeighbors::fit(
            matrix.transposed(),
            self.n_neighbors.min(matrix.n_products()),
        ));
        self.matrix = Some(matrix.clone());
        self.trained_at = Some(Utc::now());
        debug!("Trained item-based k-NN over {} products", matrix.n_products());
        Ok(())
    }

    /// Recommend products for a user from similar users' ratings.
    ///
    /// Per-item score is the similarity-weighted average of neighbor
    /// ratings. With `exclude_interacted`, anything the user already rated
    /// is masked to -infinity so it can never surface. Only items with a
    /// positive score are returned, best first; ties keep column order.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn recommend_user_based(
        &self,
        user_id: &str,
        n: usize,
        exclude_interacted: bool,
    ) -> Result<Vec<(ProductId, f32)>> {
        let model = self
            .user_model
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE_USER))?;
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE_USER))?;

        let Some(user_idx) = matrix.user_index(user_id) else {
            return Ok(Vec::new());
        };

        let neighbors: Vec<(usize, f32)> = model
            .kneighbors(matrix.user_row(user_idx))
            .into_iter()
            .filter(|&(idx, _)| idx != user_idx)
            .map(|(idx, dist)| (idx, 1.0 - dist))
            .collect();
        let sim_sum: f32 = neighbors.iter().map(|&(_, sim)| sim).sum();
        if sim_sum <= 0.0 {
            return Ok(Vec::new());
        }

        let mut scores = vec![0.0f32; matrix.n_products()];
        for &(idx, sim) in &neighbors {
            let row = matrix.user_row(idx);
            for (j, score) in scores.iter_mut().enumerate() {
                *score += sim * row[j];
            }
        }
        for score in scores.iter_mut() {
            *score /= sim_sum;
        }

        if exclude_interacted {
            let own_row = matrix.user_row(user_idx);
            for (j, score) in scores.iter_mut().enumerate() {
                if own_row[j] > 0.0 {
                    *score = f32::NEG_INFINITY;
                }
            }
        }

        Ok(top_positive(scores, matrix.product_ids(), n))
    }

    /// Nearest item-based neighbors of a product, excluding itself.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn recommend_item_based(
        &self,
        product_id: &str,
        n: usize,
    ) -> Result<Vec<(ProductId, f32)>> {
        let model = self
            .item_model
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE_ITEM))?;
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE_ITEM))?;

        let Some(product_idx) = matrix.product_index(product_id) else {
            return Ok(Vec::new());
        };

        let similar: Vec<(ProductId, f32)> = model
            .kneighbors(matrix.product_column(product_idx))
            .into_iter()
            .filter(|&(idx, _)| idx != product_idx)
            .take(n)
            .map(|(idx, dist)| (matrix.product_ids()[idx].clone(), 1.0 - dist))
            .collect();

        Ok(similar)
    }

    /// "Frequently bought together": accumulate item-based similarity over
    /// every product in the basket, excluding the basket itself.
    pub fn recommend_for_basket(
        &self,
        basket: &[ProductId],
        n: usize,
    ) -> Result<Vec<(ProductId, f32)>> {
        if self.item_model.is_none() {
            return Err(EngineError::not_trained(ENGINE_ITEM));
        }

        // First-seen accumulation order keeps ties deterministic.
        let mut order: Vec<ProductId> = Vec::new();
        let mut accumulated: HashMap<ProductId, f32> = HashMap::new();
        for product_id in basket {
            for (rec_id, score) in self.recommend_item_based(product_id, n * 2)? {
                if basket.contains(&rec_id) {
                    continue;
                }
                if !accumulated.contains_key(&rec_id) {
                    order.push(rec_id.clone());
                }
                *accumulated.entry(rec_id).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(ProductId, f32)> = order
            .into_iter()
            .map(|id| {
                let score = accumulated[&id];
                (id, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Serialize the full trained state to a JSON blob on disk.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Reload a previously saved trained state verbatim.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Stable descending sort over positive scores, truncated to n.
fn top_positive(scores: Vec<f32>, product_ids: &[ProductId], n: usize) -> Vec<(ProductId, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores
        .into_iter()
        .enumerate()
        .filter(|&(_, score)| score > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(n)
        .map(|(idx, score)| (product_ids[idx].clone(), score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::{Interaction, InteractionType};

    fn interaction(user: &str, product: &str, kind: InteractionType) -> Interaction {
        Interaction::new(user, product, kind, Utc::now())
    }

    /// u1: p1 purchase, p2 view / u2: p1 view, p3 purchase / u3: p2 purchase, p3 view
    fn trained_engine() -> CollaborativeFilteringEngine {
        let interactions = vec![
            interaction("u1", "p1", InteractionType::Purchase),
            interaction("u1", "p2", InteractionType::View),
            interaction("u2", "p1", InteractionType::View),
            interaction("u2", "p3", InteractionType::Purchase),
            interaction("u3", "p2", InteractionType::Purchase),
            interaction("u3", "p3", InteractionType::View),
        ];
        let matrix = UserItemMatrix::from_interactions(&interactions);
        let mut engine = CollaborativeFilteringEngine::new(20);
        engine.train_user_based(&matrix).unwrap();
        engine.train_item_based(&matrix).unwrap();
        engine
    }

    #[test]
    fn test_recommend_before_train_fails() {
        let engine = CollaborativeFilteringEngine::new(20);
        assert!(matches!(
            engine.recommend_user_based("u1", 5, true),
            Err(EngineError::NotTrained { .. })
        ));
        assert!(matches!(
            engine.recommend_item_based("p1", 5),
            Err(EngineError::NotTrained { .. })
        ));
        assert!(matches!(
            engine.recommend_for_basket(&["p1".to_string()], 5),
            Err(EngineError::NotTrained { .. })
        ));
    }

    #[test]
    fn test_unknown_ids_give_empty_results() {
        let engine = trained_engine();
        assert!(engine.recommend_user_based("ghost", 5, true).unwrap().is_empty());
        assert!(engine.recommend_item_based("ghost", 5).unwrap().is_empty());
    }

    #[test]
    fn test_user_based_excludes_interacted() {
        let engine = trained_engine();
        let recs = engine.recommend_user_based("u1", 10, true).unwrap();
        assert!(!recs.is_empty());
        for (product_id, score) in &recs {
            assert_ne!(product_id, "p1");
            assert_ne!(product_id, "p2");
            assert!(*score > 0.0);
        }
        // The only un-interacted product for u1 is p3.
        assert_eq!(recs[0].0, "p3");
    }

    #[test]
    fn test_user_based_can_include_interacted_when_asked() {
        let engine = trained_engine();
        let recs = engine.recommend_user_based("u1", 10, false).unwrap();
        let ids: Vec<&str> = recs.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"p3"));
        assert!(ids.len() > 1);
    }

    #[test]
    fn test_item_based_excludes_self_and_is_idempotent() {
        let engine = trained_engine();
        let first = engine.recommend_item_based("p1", 2).unwrap();
        let second = engine.recommend_item_based("p1", 2).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|(id, _)| id != "p1"));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_basket_excludes_basket_members() {
        let engine = trained_engine();
        let basket = vec!["p1".to_string(), "p2".to_string()];
        let recs = engine.recommend_for_basket(&basket, 3).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].0, "p3");
        // Similarity accumulated from both basket members.
        let single = engine.recommend_for_basket(&basket[..1].to_vec(), 3).unwrap();
        let p3_single = single.iter().find(|(id, _)| id == "p3").unwrap().1;
        assert!(recs[0].1 > p3_single);
    }

    #[test]
    fn test_end_to_end_similar_items_scenario() {
        let interactions = vec![
            interaction("u1", "p1", InteractionType::Purchase),
            interaction("u1", "p2", InteractionType::View),
            interaction("u2", "p1", InteractionType::View),
            interaction("u2", "p3", InteractionType::Purchase),
        ];
        let matrix = UserItemMatrix::from_interactions(&interactions);
        let mut engine = CollaborativeFilteringEngine::new(20);
        engine.train_item_based(&matrix).unwrap();

        let similar = engine.recommend_item_based("p1", 1).unwrap();
        assert_eq!(similar.len(), 1);
        assert!(similar[0].0 == "p2" || similar[0].0 == "p3");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let engine = trained_engine();
        let path = std::env::temp_dir().join("cf_engine_round_trip.json");
        engine.save_to(&path).unwrap();
        let reloaded = CollaborativeFilteringEngine::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            engine.recommend_item_based("p1", 2).unwrap(),
            reloaded.recommend_item_based("p1", 2).unwrap()
        );
    }
}
