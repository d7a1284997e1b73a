//! Hybrid engine blending collaborative signal with product metadata.
//!
//! ## Algorithm
//!
//! Every product is a bag of features: its own identity tag plus shared
//! metadata tags (category, brand, price band, rounded rating). Each
//! feature carries a latent embedding and a bias; an item's representation
//! is the sum over its features, a user's is a per-user embedding. The
//! affinity score is the dot product plus biases, unbounded and only
//! meaningful relative to other scores from the same model.
//!
//! Training is SGD over (user, positive item, sampled negative item)
//! triples, with either a pairwise BPR loss or a pointwise logistic loss.
//! The interaction's affinity weight scales the gradient, so a purchase
//! moves the embeddings five times as far as a view. Shared metadata tags
//! are what lets the model score cold items sensibly: a new product with no
//! interactions still inherits signal from its category and brand.

use crate::error::{EngineError, Result};
use crate::weighting::weighted_value;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use store::{Interaction, Product, ProductId, UserId};
use tracing::{debug, instrument};

const ENGINE: &str = "hybrid";

/// Price band tag for a KES price.
pub fn price_band(price: f64) -> &'static str {
    if price < 500.0 {
        "budget"
    } else if price < 2000.0 {
        "mid"
    } else if price < 10_000.0 {
        "premium"
    } else {
        "luxury"
    }
}

/// Metadata tags shared across products; identity tags are added separately.
fn metadata_tags(product: &Product) -> Vec<String> {
    vec![
        format!("category:{}", product.category),
        format!("brand:{}", product.brand),
        format!("price_range:{}", price_band(product.price)),
        format!("rating:{}", product.average_rating.round() as i32),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingLoss {
    /// Bayesian personalized ranking: pairwise, optimizes ordering.
    Bpr,
    /// Pointwise logistic: positives toward 1, sampled negatives toward 0.
    Logistic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridConfig {
    pub loss: RankingLoss,
    pub learning_rate: f32,
    pub epochs: usize,
    pub n_components: usize,
    pub seed: u64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            loss: RankingLoss::Bpr,
            learning_rate: 0.05,
            epochs: 30,
            n_components: 30,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HybridState {
    user_ids: Vec<UserId>,
    user_index: HashMap<UserId, usize>,
    product_ids: Vec<ProductId>,
    product_index: HashMap<ProductId, usize>,

    /// Feature indices per product, identity tag first.
    item_features: Vec<Vec<usize>>,
    user_embeddings: Array2<f32>,
    user_biases: Vec<f32>,
    feature_embeddings: Array2<f32>,
    feature_biases: Vec<f32>,

    /// Cached per-item sums of feature embeddings and biases.
    item_reprs: Array2<f32>,
    item_bias_totals: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridEngine {
    config: HybridConfig,
    state: Option<HybridState>,
    trained_at: Option<DateTime<Utc>>,
}

impl HybridEngine {
    pub fn new(config: HybridConfig) -> Self {
        Self {
            config,
            state: None,
            trained_at: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    #[instrument(skip_all, fields(products = products.len(), interactions = interactions.len()))]
    pub fn train(&mut self, products: &[Product], interactions: &[Interaction]) -> Result<()> {
        if products.len() < 2 {
            return Err(EngineError::invalid_config(
                "hybrid training needs at least two products to sample negatives",
            ));
        }

        // Feature space: one identity tag per product plus the shared
        // metadata tags, indexed in first-seen order.
        let mut feature_index: HashMap<String, usize> = HashMap::new();
        let mut product_ids: Vec<ProductId> = Vec::with_capacity(products.len());
        let mut product_index: HashMap<ProductId, usize> = HashMap::new();
        let mut item_features: Vec<Vec<usize>> = Vec::with_capacity(products.len());
        for product in products {
            if product_index.contains_key(&product.id) {
                continue;
            }
            product_index.insert(product.id.clone(), product_ids.len());
            product_ids.push(product.id.clone());

            let mut tags = vec![format!("item:{}", product.id)];
            tags.extend(metadata_tags(product));
            let features = tags
                .into_iter()
                .map(|tag| {
                    let next = feature_index.len();
                    *feature_index.entry(tag).or_insert(next)
                })
                .collect();
            item_features.push(features);
        }

        // Users and positive training pairs; interactions for products not
        // in the catalog carry no usable features and are skipped.
        let mut user_ids: Vec<UserId> = Vec::new();
        let mut user_index: HashMap<UserId, usize> = HashMap::new();
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        let mut skipped = 0usize;
        for interaction in interactions {
            let Some(&item) = product_index.get(&interaction.product_id) else {
                skipped += 1;
                continue;
            };
            let user = *user_index
                .entry(interaction.user_id.clone())
                .or_insert_with(|| {
                    user_ids.push(interaction.user_id.clone());
                    user_ids.len() - 1
                });
            pairs.push((user, item, weighted_value(interaction)));
        }
        if skipped > 0 {
            debug!(skipped, "Dropped interactions for uncataloged products");
        }
        if pairs.is_empty() {
            return Err(EngineError::invalid_config(
                "hybrid training needs at least one interaction on a cataloged product",
            ));
        }

        let k = self.config.n_components;
        let scale = 1.0 / k as f32;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut user_embeddings =
            Array2::from_shape_fn((user_ids.len(), k), |_| (rng.random::<f32>() - 0.5) * scale);
        let mut user_biases = vec![0.0f32; user_ids.len()];
        let mut feature_embeddings =
            Array2::from_shape_fn((feature_index.len(), k), |_| {
                (rng.random::<f32>() - 0.5) * scale
            });
        let mut feature_biases = vec![0.0f32; feature_index.len()];

        let lr = self.config.learning_rate;
        let n_items = product_ids.len();
        let item_repr = |features: &[usize], embeddings: &Array2<f32>| -> Array1<f32> {
            let mut repr = Array1::<f32>::zeros(k);
            for &f in features {
                repr += &embeddings.row(f);
            }
            repr
        };
        let bias_total = |features: &[usize], biases: &[f32]| -> f32 {
            features.iter().map(|&f| biases[f]).sum()
        };

        for _ in 0..self.config.epochs {
            pairs.shuffle(&mut rng);
            for &(user, pos, weight) in &pairs {
                let neg = loop {
                    let candidate = rng.random_range(0..n_items);
                    if candidate != pos {
                        break candidate;
                    }
                };
                let user_row = user_embeddings.row(user).to_owned();

                match self.config.loss {
                    RankingLoss::Bpr => {
                        let pos_repr = item_repr(&item_features[pos], &feature_embeddings);
                        let neg_repr = item_repr(&item_features[neg], &feature_embeddings);
                        let margin = user_row.dot(&pos_repr) - user_row.dot(&neg_repr)
                            + bias_total(&item_features[pos], &feature_biases)
                            - bias_total(&item_features[neg], &feature_biases);
                        let step = lr * weight * sigmoid(-margin);

                        let user_delta = (&pos_repr - &neg_repr) * step;
                        user_embeddings
                            .row_mut(user)
                            .zip_mut_with(&user_delta, |a, &d| *a += d);
                        for &f in &item_features[pos] {
                            feature_embeddings
                                .row_mut(f)
                                .zip_mut_with(&user_row, |a, &u| *a += step * u);
                            feature_biases[f] += step;
                        }
                        for &f in &item_features[neg] {
                            feature_embeddings
                                .row_mut(f)
                                .zip_mut_with(&user_row, |a, &u| *a -= step * u);
                            feature_biases[f] -= step;
                        }
                    }
                    RankingLoss::Logistic => {
                        for (item, label) in [(pos, 1.0f32), (neg, 0.0f32)] {
                            let repr = item_repr(&item_features[item], &feature_embeddings);
                            let score = user_row.dot(&repr)
                                + user_biases[user]
                                + bias_total(&item_features[item], &feature_biases);
                            let step = lr * weight * (label - sigmoid(score));

                            let user_delta = &repr * step;
                            user_embeddings
                                .row_mut(user)
                                .zip_mut_with(&user_delta, |a, &d| *a += d);
                            user_biases[user] += step;
                            for &f in &item_features[item] {
                                feature_embeddings
                                    .row_mut(f)
                                    .zip_mut_with(&user_row, |a, &u| *a += step * u);
                                feature_biases[f] += step;
                            }
                        }
                    }
                }
            }
        }

        let mut item_reprs = Array2::<f32>::zeros((n_items, k));
        let mut item_bias_totals = vec![0.0f32; n_items];
        for (item, features) in item_features.iter().enumerate() {
            item_reprs
                .row_mut(item)
                .assign(&item_repr(features, &feature_embeddings));
            item_bias_totals[item] = bias_total(features, &feature_biases);
        }

        debug!(
            users = user_ids.len(),
            items = n_items,
            features = feature_index.len(),
            "Trained hybrid model"
        );
        self.state = Some(HybridState {
            user_ids,
            user_index,
            product_ids,
            product_index,
            item_features,
            user_embeddings,
            user_biases,
            feature_embeddings,
            feature_biases,
            item_reprs,
            item_bias_totals,
        });
        self.trained_at = Some(Utc::now());
        Ok(())
    }

    /// Raw affinity score for a known (user, product) pair.
    pub fn score(&self, user_id: &str, product_id: &str) -> Option<f32> {
        let state = self.state.as_ref()?;
        let user = *state.user_index.get(user_id)?;
        let item = *state.product_index.get(product_id)?;
        Some(
            state.user_embeddings.row(user).dot(&state.item_reprs.row(item))
                + state.user_biases[user]
                + state.item_bias_totals[item],
        )
    }

    /// Top-n products for a user by raw score. Every cataloged item is
    /// ranked, interacted ones included; callers wanting novelty filter
    /// on their side.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn recommend(&self, user_id: &str, n: usize) -> Result<Vec<(ProductId, f32)>> {
        let state = self.state.as_ref().ok_or(EngineError::not_trained(ENGINE))?;
        let Some(&user) = state.user_index.get(user_id) else {
            return Ok(Vec::new());
        };

        let user_row = state.user_embeddings.row(user);
        let mut scored: Vec<(usize, f32)> = (0..state.product_ids.len())
            .map(|item| {
                let score = user_row.dot(&state.item_reprs.row(item))
                    + state.user_biases[user]
                    + state.item_bias_totals[item];
                (item, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(n)
            .map(|(item, score)| (state.product_ids[item].clone(), score))
            .collect())
    }

    /// Products whose feature representations are closest to `product_id`
    /// by cosine similarity, excluding the product itself.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn similar_items(&self, product_id: &str, n: usize) -> Result<Vec<(ProductId, f32)>> {
        let state = self.state.as_ref().ok_or(EngineError::not_trained(ENGINE))?;
        let Some(&target) = state.product_index.get(product_id) else {
            return Ok(Vec::new());
        };

        let target_repr = state.item_reprs.row(target);
        let target_norm = target_repr.dot(&target_repr).sqrt();
        if target_norm <= f32::EPSILON {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..state.product_ids.len())
            .filter(|&item| item != target)
            .map(|item| {
                let repr = state.item_reprs.row(item);
                let norm = repr.dot(&repr).sqrt();
                let sim = if norm <= f32::EPSILON {
                    0.0
                } else {
                    target_repr.dot(&repr) / (target_norm * norm)
                };
                (item, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(n)
            .map(|(item, sim)| (state.product_ids[item].clone(), sim))
            .collect())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::InteractionType;

    fn product(id: &str, category: &str, brand: &str, price: f64, rating: f32) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            category: category.to_string(),
            brand: brand.to_string(),
            price,
            average_rating: rating,
            county: None,
        }
    }

    fn interaction(user: &str, product: &str, kind: InteractionType) -> Interaction {
        Interaction::new(user, product, kind, Utc::now())
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("p1", "electronics", "Techno", 1500.0, 4.2),
            product("p2", "electronics", "Techno", 1800.0, 4.4),
            product("p3", "electronics", "Techno", 1600.0, 4.1),
            product("p4", "farming", "Shamba", 25_000.0, 3.0),
        ]
    }

    fn clicks() -> Vec<Interaction> {
        vec![
            interaction("u1", "p1", InteractionType::Purchase),
            interaction("u1", "p2", InteractionType::Purchase),
            interaction("u2", "p1", InteractionType::Purchase),
            interaction("u2", "p2", InteractionType::Purchase),
            interaction("u2", "p3", InteractionType::Purchase),
            interaction("u3", "p4", InteractionType::Purchase),
        ]
    }

    #[test]
    fn test_price_bands() {
        assert_eq!(price_band(499.0), "budget");
        assert_eq!(price_band(500.0), "mid");
        assert_eq!(price_band(1999.0), "mid");
        assert_eq!(price_band(2000.0), "premium");
        assert_eq!(price_band(9999.0), "premium");
        assert_eq!(price_band(10_000.0), "luxury");
    }

    #[test]
    fn test_metadata_tags() {
        let tags = metadata_tags(&product("p1", "electronics", "Techno", 1500.0, 4.2));
        assert_eq!(
            tags,
            vec![
                "category:electronics",
                "brand:Techno",
                "price_range:mid",
                "rating:4"
            ]
        );
    }

    #[test]
    fn test_recommend_before_train_fails() {
        let engine = HybridEngine::new(HybridConfig::default());
        assert!(matches!(
            engine.recommend("u1", 5),
            Err(EngineError::NotTrained { .. })
        ));
        assert!(matches!(
            engine.similar_items("p1", 5),
            Err(EngineError::NotTrained { .. })
        ));
    }

    #[test]
    fn test_training_rejects_degenerate_input() {
        let mut engine = HybridEngine::new(HybridConfig::default());
        let single = vec![product("p1", "electronics", "Techno", 1500.0, 4.2)];
        assert!(matches!(
            engine.train(&single, &clicks()),
            Err(EngineError::InvalidConfig { .. })
        ));
        assert!(matches!(
            engine.train(&catalog(), &[]),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unknown_user_gives_empty_result() {
        let mut engine = HybridEngine::new(HybridConfig::default());
        engine.train(&catalog(), &clicks()).unwrap();
        assert!(engine.recommend("ghost", 5).unwrap().is_empty());
        assert!(engine.similar_items("ghost", 5).unwrap().is_empty());
    }

    #[test]
    fn test_recommend_ranks_interacted_items_too() {
        let mut engine = HybridEngine::new(HybridConfig::default());
        engine.train(&catalog(), &clicks()).unwrap();

        // u2 interacted with p1, p2, and p3; all four products still rank.
        let recs = engine.recommend("u2", 10).unwrap();
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().any(|(id, _)| id == "p1"));
    }

    #[test]
    fn test_fully_interacted_user_still_gets_a_ranking() {
        let catalog = &catalog()[..3];
        let purchases: Vec<Interaction> = catalog
            .iter()
            .map(|p| interaction("u1", &p.id, InteractionType::Purchase))
            .collect();
        let mut engine = HybridEngine::new(HybridConfig::default());
        engine.train(catalog, &purchases).unwrap();

        let recs = engine.recommend("u1", 3).unwrap();
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn test_shared_metadata_ranks_related_item_above_unrelated() {
        // u1 bought p1 and p2; p3 shares category, brand, and price band
        // with them, p4 shares nothing. More epochs than the default to
        // leave convergence headroom.
        let config = HybridConfig {
            epochs: 150,
            ..HybridConfig::default()
        };
        let mut engine = HybridEngine::new(config);
        engine.train(&catalog(), &clicks()).unwrap();

        let recs = engine.recommend("u1", 10).unwrap();
        let ids: Vec<&str> = recs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        let pos = |id: &str| ids.iter().position(|&i| i == id).unwrap();
        assert!(pos("p3") < pos("p4"));
    }

    #[test]
    fn test_similar_items_follow_shared_features() {
        let mut engine = HybridEngine::new(HybridConfig::default());
        engine.train(&catalog(), &clicks()).unwrap();

        let similar = engine.similar_items("p1", 3).unwrap();
        let p2_sim = similar.iter().find(|(id, _)| id == "p2").unwrap().1;
        let p4_sim = similar.iter().find(|(id, _)| id == "p4").unwrap().1;
        assert!(p2_sim > p4_sim);
    }

    #[test]
    fn test_logistic_loss_trains() {
        let config = HybridConfig {
            loss: RankingLoss::Logistic,
            ..HybridConfig::default()
        };
        let mut engine = HybridEngine::new(config);
        engine.train(&catalog(), &clicks()).unwrap();
        assert!(!engine.recommend("u1", 5).unwrap().is_empty());
    }

    #[test]
    fn test_training_is_deterministic() {
        let mut a = HybridEngine::new(HybridConfig::default());
        let mut b = HybridEngine::new(HybridConfig::default());
        a.train(&catalog(), &clicks()).unwrap();
        b.train(&catalog(), &clicks()).unwrap();
        assert_eq!(a.recommend("u1", 5).unwrap(), b.recommend("u1", 5).unwrap());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut engine = HybridEngine::new(HybridConfig::default());
        engine.train(&catalog(), &clicks()).unwrap();

        let path = std::env::temp_dir().join("hybrid_engine_round_trip.json");
        engine.save_to(&path).unwrap();
        let reloaded = HybridEngine::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            engine.recommend("u1", 5).unwrap(),
            reloaded.recommend("u1", 5).unwrap()
        );
    }
}
