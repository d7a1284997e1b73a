//! # Recommendation Orchestrator
//!
//! Coordinates the whole serving path behind a single `recommend` call:
//! 1. Clamp the requested result count
//! 2. Check the advisory cache (context-free requests only)
//! 3. Dispatch on algorithm + target to the current model snapshot
//! 4. Fall back to trending, then to placeholder samples, when the
//!    engine cannot answer
//! 5. Attach a human-readable explanation of how the list was produced
//!
//! Serving never fails: engine errors are logged and degrade to the
//! fallback chain. Training is the only fallible operation, and it is
//! all-or-nothing: a new snapshot is published only after every engine
//! trained successfully.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use engines::{
    CollaborativeFilteringEngine, HybridEngine, MatrixFactorizationEngine, UserItemMatrix,
};
use ranking::{BoostPipeline, RequestContext, TimeWindow, TrendingScorer};
use store::{DataStore, Product, ProductId};

use crate::cache::{Cache, MemoryCache};
use crate::config::RecommenderConfig;
use crate::snapshot::ModelSnapshot;
use crate::types::{Algorithm, RecommendationRequest, RecommendationResponse, RecommendedItem, Target};

const FALLBACK_ALGORITHM: &str = "fallback";
const TRENDING_ALGORITHM: &str = "trending";
const MAX_SAMPLE_FALLBACK: usize = 10;

/// Main orchestrator that owns the model snapshot and serving policy.
pub struct RecommendationOrchestrator {
    store: Arc<DataStore>,
    config: RecommenderConfig,
    trending: TrendingScorer,
    boosts: BoostPipeline,
    cache: Arc<dyn Cache>,
    snapshot: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl RecommendationOrchestrator {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self::with_config(store, RecommenderConfig::default())
    }

    pub fn with_config(store: Arc<DataStore>, config: RecommenderConfig) -> Self {
        Self {
            trending: TrendingScorer::new(store.clone()),
            boosts: BoostPipeline::standard(),
            cache: Arc::new(MemoryCache::new()),
            snapshot: RwLock::new(None),
            store,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    fn current_snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.snapshot.read().ok().and_then(|guard| guard.clone())
    }

    pub fn model_version(&self) -> Option<u64> {
        self.current_snapshot().map(|s| s.version)
    }

    /// True when there is no snapshot, or the current one has aged past
    /// the retrain interval.
    pub fn should_retrain(&self) -> bool {
        match self.current_snapshot() {
            None => true,
            Some(snapshot) => {
                let age = Utc::now() - snapshot.trained_at;
                age.to_std()
                    .map(|age| age >= self.config.retrain_interval())
                    .unwrap_or(false)
            }
        }
    }

    // ========================================================================
    // Serving
    // ========================================================================

    /// Answer a recommendation request. Never fails: requests no engine
    /// can answer degrade to trending, then to placeholder samples.
    #[instrument(skip(self, request), fields(algorithm = %request.algorithm))]
    pub fn recommend(&self, request: &RecommendationRequest) -> RecommendationResponse {
        let n = self.config.clamp_n(request.n);
        match (request.algorithm, &request.target) {
            (Algorithm::Trending, _) => self.trending_response(request, n),
            (Algorithm::ContextAware, Target::User(user_id)) => {
                self.context_aware_response(user_id, request.context.as_ref(), n)
            }
            (_, Target::Basket(basket)) if !basket.is_empty() => self.basket_response(basket, n),
            (
                Algorithm::UserBased | Algorithm::MatrixFactorization | Algorithm::Hybrid,
                Target::User(user_id),
            ) => self.personalized_response(user_id, request.algorithm, n),
            (
                Algorithm::ItemBased | Algorithm::MatrixFactorization | Algorithm::Hybrid,
                Target::Product(product_id),
            ) => self.similar_response(product_id, request.algorithm, n),
            (algorithm, _) => {
                debug!(%algorithm, "Algorithm cannot answer for this target, serving fallback");
                RecommendationResponse::new(
                    self.fallback_recommendations(n),
                    format!(
                        "{} cannot answer for this target; showing popular products instead",
                        algorithm
                    ),
                )
            }
        }
    }

    fn personalized_response(
        &self,
        user_id: &str,
        algorithm: Algorithm,
        n: usize,
    ) -> RecommendationResponse {
        let key = format!("personalized:{}:{}:{}", user_id, algorithm.as_str(), n);
        if let Some(response) = self.cached_response(&key) {
            return response;
        }

        let scored = self.current_snapshot().map(|snapshot| match algorithm {
            Algorithm::UserBased => snapshot.cf.recommend_user_based(user_id, n, true),
            Algorithm::MatrixFactorization => snapshot.mf.recommend(user_id, n, true),
            Algorithm::Hybrid => snapshot.hybrid.recommend(user_id, n),
            _ => unreachable!("dispatched in recommend"),
        });
        let explanation = match algorithm {
            Algorithm::UserBased => {
                format!("Shoppers with similar activity to {} also liked these products", user_id)
            }
            Algorithm::MatrixFactorization => {
                format!("Predicted ratings for {} from latent taste factors", user_id)
            }
            _ => format!("Learned preferences for {} blended with product metadata", user_id),
        };

        let response = self.respond(scored, algorithm, n, explanation);
        self.cache_response(&key, &response, self.config.personalized_ttl_secs);
        response
    }

    fn similar_response(
        &self,
        product_id: &str,
        algorithm: Algorithm,
        n: usize,
    ) -> RecommendationResponse {
        let key = format!("similar:{}:{}:{}", product_id, algorithm.as_str(), n);
        if let Some(response) = self.cached_response(&key) {
            return response;
        }

        let scored = self.current_snapshot().map(|snapshot| match algorithm {
            Algorithm::ItemBased => snapshot.cf.recommend_item_based(product_id, n),
            Algorithm::MatrixFactorization => snapshot.mf.similar_items(product_id, n),
            _ => snapshot.hybrid.similar_items(product_id, n),
        });
        let explanation = match algorithm {
            Algorithm::ItemBased => {
                format!("Products shoppers interacted with alongside {}", product_id)
            }
            Algorithm::MatrixFactorization => {
                format!("Products close to {} in latent factor space", product_id)
            }
            _ => format!("Products whose learned representation matches {}", product_id),
        };

        let response = self.respond(scored, algorithm, n, explanation);
        self.cache_response(&key, &response, self.config.similar_ttl_secs);
        response
    }

    /// "Frequently bought together" for a basket of products. Uncached:
    /// basket contents vary too much for the cache to earn its keep.
    fn basket_response(&self, basket: &[ProductId], n: usize) -> RecommendationResponse {
        let scored = self
            .current_snapshot()
            .map(|snapshot| snapshot.cf.recommend_for_basket(basket, n));
        let explanation = format!(
            "Frequently interacted with alongside the {} item(s) in the basket",
            basket.len()
        );
        self.respond(scored, Algorithm::ItemBased, n, explanation)
    }

    fn trending_response(&self, request: &RecommendationRequest, n: usize) -> RecommendationResponse {
        let window = request.window.unwrap_or_default();
        let county = request.county.as_deref();
        let category = request.category.as_deref();
        let key = format!(
            "trending:{}:{}:{}:{}",
            window.as_str(),
            n,
            county.unwrap_or("-"),
            category.unwrap_or("-")
        );
        if let Some(response) = self.cached_response(&key) {
            return response;
        }

        let scored = self.trending.trending_filtered(window, n, county, category);
        let items: Vec<RecommendedItem> = scored
            .into_iter()
            .map(|(id, score)| RecommendedItem::new(id, score, TRENDING_ALGORITHM))
            .collect();
        let mut explanation = format!("Most popular products over the last {}", window.as_str());
        if let Some(category) = category {
            explanation.push_str(&format!(" in {}", category));
        }
        if let Some(county) = county {
            explanation.push_str(&format!(" in {}", county));
        }

        let response = RecommendationResponse::new(items, explanation);
        self.cache_response(&key, &response, self.config.trending_ttl_secs);
        response
    }

    /// Hybrid candidates, over-fetched at 2n, rescaled by the context
    /// boosts and cut back to n. Uncached: the boost factor varies per
    /// request.
    fn context_aware_response(
        &self,
        user_id: &str,
        ctx: Option<&RequestContext>,
        n: usize,
    ) -> RecommendationResponse {
        let default_ctx = RequestContext::default();
        let ctx = ctx.unwrap_or(&default_ctx);
        let factor = self.boosts.combined_factor(ctx);

        let scored = self
            .current_snapshot()
            .map(|snapshot| snapshot.hybrid.recommend(user_id, n * 2));
        match scored {
            Some(Ok(scored)) if !scored.is_empty() => {
                let items = self
                    .boosts
                    .apply(scored, ctx, n)
                    .into_iter()
                    .map(|(id, score)| {
                        RecommendedItem::new(id, score, Algorithm::ContextAware.as_str())
                    })
                    .collect();
                RecommendationResponse::new(
                    items,
                    format!(
                        "Hybrid picks for {} rescaled by {:.2} for the request context",
                        user_id, factor
                    ),
                )
            }
            other => {
                let mut response = self.fallback_response(other, Algorithm::ContextAware, n);
                response.items = self.apply_context(response.items, ctx, n);
                response
            }
        }
    }

    /// Wrap an engine answer, degrading to the fallback chain on empty
    /// results, engine errors, or a missing snapshot.
    fn respond(
        &self,
        scored: Option<engines::Result<Vec<(ProductId, f32)>>>,
        algorithm: Algorithm,
        n: usize,
        explanation: String,
    ) -> RecommendationResponse {
        match scored {
            Some(Ok(scored)) if !scored.is_empty() => {
                let items = scored
                    .into_iter()
                    .map(|(id, score)| RecommendedItem::new(id, score, algorithm.as_str()))
                    .collect();
                RecommendationResponse::new(items, explanation)
            }
            other => self.fallback_response(other, algorithm, n),
        }
    }

    fn fallback_response(
        &self,
        scored: Option<engines::Result<Vec<(ProductId, f32)>>>,
        algorithm: Algorithm,
        n: usize,
    ) -> RecommendationResponse {
        let explanation = match scored {
            Some(Ok(_)) => {
                debug!(%algorithm, "No results for this target, serving fallback");
                format!(
                    "No {} results for this target; showing popular products instead",
                    algorithm
                )
            }
            Some(Err(error)) => {
                warn!(%error, %algorithm, "Engine failed, serving fallback");
                format!(
                    "The {} model was unavailable; showing popular products instead",
                    algorithm
                )
            }
            None => {
                debug!("No trained models yet, serving fallback");
                "Models are not trained yet; showing popular products instead".to_string()
            }
        };
        RecommendationResponse::new(self.fallback_recommendations(n), explanation)
    }

    /// Last-resort results for requests no engine can answer. Prefers
    /// real trending traffic over the widest window; with a completely
    /// empty log it serves labeled placeholders so callers always get a
    /// well-formed response.
    pub fn fallback_recommendations(&self, n: usize) -> Vec<RecommendedItem> {
        let trending = self.trending.trending(TimeWindow::Month, n);
        if !trending.is_empty() {
            return trending
                .into_iter()
                .map(|(id, score)| RecommendedItem::new(id, score, TRENDING_ALGORITHM))
                .collect();
        }

        (0..n.min(MAX_SAMPLE_FALLBACK))
            .map(|i| {
                RecommendedItem::new(
                    format!("sample-product-{}", i),
                    0.9 - 0.1 * i as f32,
                    FALLBACK_ALGORITHM,
                )
            })
            .collect()
    }

    /// Rescale scores with the boost chain, preserving each item's
    /// originating algorithm label.
    fn apply_context(
        &self,
        items: Vec<RecommendedItem>,
        ctx: &RequestContext,
        n: usize,
    ) -> Vec<RecommendedItem> {
        let labels: HashMap<ProductId, String> = items
            .iter()
            .map(|item| (item.product_id.clone(), item.algorithm.clone()))
            .collect();
        let scored: Vec<(ProductId, f32)> = items
            .into_iter()
            .map(|item| (item.product_id, item.score))
            .collect();
        self.boosts
            .apply(scored, ctx, n)
            .into_iter()
            .map(|(product_id, score)| {
                let algorithm = labels
                    .get(&product_id)
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_ALGORITHM.to_string());
                RecommendedItem {
                    product_id,
                    score,
                    algorithm,
                }
            })
            .collect()
    }

    fn cached_response(&self, key: &str) -> Option<RecommendationResponse> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(error) => {
                debug!(%error, key, "Dropping undecodable cache entry");
                self.cache.delete(key);
                None
            }
        }
    }

    fn cache_response(&self, key: &str, response: &RecommendationResponse, ttl_secs: u64) {
        match serde_json::to_string(response) {
            Ok(raw) => self
                .cache
                .set(key, raw, std::time::Duration::from_secs(ttl_secs)),
            Err(error) => debug!(%error, key, "Skipping cache write"),
        }
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Train every engine on the current data and publish a new snapshot.
    /// If any engine fails, the previous snapshot stays in place.
    #[instrument(skip(self))]
    pub fn train(&self) -> Result<()> {
        let start_time = Instant::now();
        let interactions = self.store.interactions();
        if interactions.is_empty() {
            bail!("no interactions to train on");
        }

        let matrix = UserItemMatrix::from_interactions(interactions);
        info!(
            users = matrix.n_users(),
            products = matrix.n_products(),
            interactions = interactions.len(),
            "Training all engines"
        );

        let mut cf = CollaborativeFilteringEngine::new(self.config.knn_neighbors);
        cf.train_user_based(&matrix)
            .context("training user-based collaborative filtering")?;
        cf.train_item_based(&matrix)
            .context("training item-based collaborative filtering")?;

        let mut mf = MatrixFactorizationEngine::new(self.config.svd_factors);
        mf.train(&matrix).context("training matrix factorization")?;

        let products: Vec<Product> = self.store.products().cloned().collect();
        let mut hybrid = HybridEngine::new(self.config.hybrid);
        hybrid
            .train(&products, interactions)
            .context("training hybrid model")?;

        // Version is read and bumped under the write guard so overlapping
        // training runs cannot publish the same version.
        let version = match self.snapshot.write() {
            Ok(mut guard) => {
                let version = guard.as_ref().map(|s| s.version).unwrap_or(0) + 1;
                *guard = Some(Arc::new(ModelSnapshot {
                    cf,
                    mf,
                    hybrid,
                    version,
                    trained_at: Utc::now(),
                }));
                version
            }
            Err(_) => bail!("model snapshot lock poisoned"),
        };

        info!(version, elapsed = ?start_time.elapsed(), "Published new model snapshot");
        Ok(())
    }

    /// Training on the blocking pool with the configured timeout. On
    /// timeout the training task is abandoned and the previous snapshot
    /// keeps serving.
    pub async fn train_with_timeout(self: &Arc<Self>) -> Result<()> {
        let this = Arc::clone(self);
        let result = tokio::time::timeout(
            self.config.training_timeout(),
            tokio::task::spawn_blocking(move || this.train()),
        )
        .await;
        match result {
            Err(_) => bail!(
                "training exceeded timeout of {:?}",
                self.config.training_timeout()
            ),
            Ok(join) => join.context("training task panicked")?,
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the current snapshot to a directory.
    pub fn save_models(&self, dir: &Path) -> Result<()> {
        match self.current_snapshot() {
            Some(snapshot) => snapshot.save_to_dir(dir),
            None => bail!("no trained models to save"),
        }
    }

    /// Load a snapshot from a directory and publish it.
    pub fn load_models(&self, dir: &Path) -> Result<()> {
        let snapshot = Arc::new(ModelSnapshot::load_from_dir(dir)?);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(_) => bail!("model snapshot lock poisoned"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ranking::{Season, TimeOfDay};
    use store::{Interaction, InteractionType};

    // ========================================================================
    // Test Fixtures
    // ========================================================================

    fn test_product(id: &str, category: &str, county: &str) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            category: category.to_string(),
            brand: "Acme".to_string(),
            price: 1200.0,
            average_rating: 4.0,
            county: Some(county.to_string()),
        }
    }

    fn recent(user: &str, product: &str, kind: InteractionType) -> Interaction {
        Interaction::new(user, product, kind, Utc::now() - Duration::hours(1))
    }

    fn build_test_store() -> Arc<DataStore> {
        let mut store = DataStore::new();
        store.insert_product(test_product("p1", "electronics", "Nairobi"));
        store.insert_product(test_product("p2", "electronics", "Mombasa"));
        store.insert_product(test_product("p3", "fashion", "Nairobi"));
        store.insert_product(test_product("p4", "fashion", "Kisumu"));

        store.record_interaction(recent("u1", "p1", InteractionType::Purchase));
        store.record_interaction(recent("u1", "p2", InteractionType::View));
        store.record_interaction(recent("u2", "p1", InteractionType::View));
        store.record_interaction(recent("u2", "p3", InteractionType::Purchase));
        store.record_interaction(recent("u3", "p2", InteractionType::Purchase));
        store.record_interaction(recent("u3", "p3", InteractionType::View));
        store.record_interaction(recent("u4", "p4", InteractionType::Purchase));
        Arc::new(store)
    }

    fn build_orchestrator() -> Arc<RecommendationOrchestrator> {
        Arc::new(RecommendationOrchestrator::new(build_test_store()))
    }

    fn user_request(user: &str, algorithm: Algorithm, n: usize) -> RecommendationRequest {
        RecommendationRequest::for_user(user, algorithm).with_n(n)
    }

    // ========================================================================
    // Fallback behavior
    // ========================================================================

    #[test]
    fn test_untrained_orchestrator_serves_trending_fallback() {
        let orchestrator = build_orchestrator();
        let response = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 5));

        assert!(!response.items.is_empty());
        assert!(response.items.iter().all(|item| item.algorithm == "trending"));
        assert!(response.explanation.contains("not trained"));
    }

    #[test]
    fn test_empty_store_serves_placeholder_samples() {
        let orchestrator = Arc::new(RecommendationOrchestrator::new(Arc::new(DataStore::new())));
        let response = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 5));

        let items = &response.items;
        assert!(!items.is_empty());
        assert_eq!(items[0].product_id, "sample-product-0");
        assert!((items[0].score - 0.9).abs() < 1e-6);
        assert!((items[1].score - 0.8).abs() < 1e-6);
        assert!(items.iter().all(|item| item.algorithm == "fallback"));
    }

    #[test]
    fn test_placeholder_fallback_is_capped() {
        let orchestrator = Arc::new(RecommendationOrchestrator::new(Arc::new(DataStore::new())));
        let items = orchestrator.fallback_recommendations(50);
        assert_eq!(items.len(), 10);
    }

    #[test]
    fn test_unknown_user_falls_back_after_training() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let response = orchestrator.recommend(&user_request("ghost", Algorithm::UserBased, 5));
        assert!(!response.items.is_empty());
        assert!(response.items.iter().all(|item| item.algorithm == "trending"));
        assert!(response.explanation.contains("popular products"));
    }

    #[test]
    fn test_mismatched_target_falls_back() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        // item_based needs a product anchor, not a user.
        let response = orchestrator.recommend(&user_request("u1", Algorithm::ItemBased, 5));
        assert!(!response.items.is_empty());
        assert!(response.items.iter().all(|item| item.algorithm == "trending"));
        assert!(response.explanation.contains("cannot answer"));
    }

    // ========================================================================
    // Personalized serving
    // ========================================================================

    #[test]
    fn test_user_based_recommendations_after_training() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let response = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 5));
        assert!(!response.items.is_empty());
        assert!(response.items.iter().all(|item| item.algorithm == "user_based"));
        assert!(response.explanation.contains("u1"));
        // u1 already interacted with p1 and p2.
        assert!(response
            .items
            .iter()
            .all(|item| item.product_id != "p1" && item.product_id != "p2"));
    }

    #[test]
    fn test_each_user_algorithm_dispatches() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        for algorithm in [
            Algorithm::UserBased,
            Algorithm::MatrixFactorization,
            Algorithm::Hybrid,
            Algorithm::Trending,
            Algorithm::ContextAware,
        ] {
            let response = orchestrator.recommend(&user_request("u1", algorithm, 5));
            assert!(!response.items.is_empty(), "{algorithm} returned nothing");
            assert!(!response.explanation.is_empty());
        }
    }

    #[test]
    fn test_similar_products_per_algorithm() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let response = orchestrator.recommend(
            &RecommendationRequest::for_product("p1", Algorithm::ItemBased).with_n(2),
        );
        assert_eq!(response.items.len(), 2);
        assert!(response.items.iter().all(|item| item.product_id != "p1"));
        assert!(response.items.iter().all(|item| item.algorithm == "item_based"));

        for algorithm in [Algorithm::MatrixFactorization, Algorithm::Hybrid] {
            let response = orchestrator
                .recommend(&RecommendationRequest::for_product("p1", algorithm).with_n(3));
            assert!(!response.items.is_empty(), "{algorithm} returned nothing");
            assert!(response.items.iter().all(|item| item.product_id != "p1"));
        }
    }

    #[test]
    fn test_basket_recommendations_exclude_basket() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let basket = vec!["p1".to_string(), "p2".to_string()];
        let response =
            orchestrator.recommend(&RecommendationRequest::for_basket(basket.clone()).with_n(3));
        assert!(!response.items.is_empty());
        assert!(response
            .items
            .iter()
            .all(|item| !basket.contains(&item.product_id)));
        assert!(response.explanation.contains("basket"));
    }

    #[test]
    fn test_requested_count_is_clamped() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let response = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 0));
        assert!(!response.items.is_empty());

        let response =
            orchestrator.recommend(&RecommendationRequest::trending().with_n(1000));
        assert!(response.items.len() <= 50);
    }

    // ========================================================================
    // Context-aware serving
    // ========================================================================

    #[test]
    fn test_context_aware_rescales_hybrid_picks() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let hybrid = orchestrator.recommend(&user_request("u1", Algorithm::Hybrid, 5));
        let top = &hybrid.items[0];

        // morning (1.2) * county (1.3) = 1.56
        let ctx = RequestContext::new()
            .with_time_of_day(TimeOfDay::Morning)
            .with_county("Nairobi");
        let boosted = orchestrator
            .recommend(&user_request("u1", Algorithm::ContextAware, 5).with_context(ctx));

        assert!(boosted.items.iter().all(|item| item.algorithm == "context_aware"));
        assert_eq!(boosted.items[0].product_id, top.product_id);
        assert!((boosted.items[0].score - top.score * 1.56).abs() < 1e-3);
        assert!(boosted.explanation.contains("1.56"));
    }

    #[test]
    fn test_context_aware_without_context_matches_hybrid_order() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let hybrid = orchestrator.recommend(&user_request("u1", Algorithm::Hybrid, 5));
        let plain = orchestrator.recommend(&user_request("u1", Algorithm::ContextAware, 5));

        let hybrid_ids: Vec<&str> = hybrid.items.iter().map(|i| i.product_id.as_str()).collect();
        let plain_ids: Vec<&str> = plain.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(hybrid_ids, plain_ids);
    }

    #[test]
    fn test_festive_season_scales_scores() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let plain = orchestrator.recommend(&user_request("u1", Algorithm::ContextAware, 5));
        let ctx = RequestContext::new().with_season(Season::Festive);
        let festive = orchestrator
            .recommend(&user_request("u1", Algorithm::ContextAware, 5).with_context(ctx));

        assert_eq!(plain.items.len(), festive.items.len());
        assert!((festive.items[0].score - plain.items[0].score * 1.3).abs() < 1e-3);
    }

    // ========================================================================
    // Trending
    // ========================================================================

    #[test]
    fn test_trending_filters() {
        let orchestrator = build_orchestrator();

        let all = orchestrator.recommend(&RecommendationRequest::trending().with_n(10));
        assert_eq!(all.items.len(), 4);
        assert!(all.explanation.contains("24h"));

        let fashion = orchestrator.recommend(
            &RecommendationRequest::trending()
                .with_n(10)
                .with_category("fashion"),
        );
        assert!(fashion
            .items
            .iter()
            .all(|item| item.product_id == "p3" || item.product_id == "p4"));
    }

    #[test]
    fn test_trending_applies_county_and_category_together() {
        let mut store = DataStore::new();
        store.insert_product(test_product("p1", "electronics", "Nairobi"));
        store.insert_product(test_product("p2", "fashion", "Nairobi"));
        store.record_interaction(
            recent("u1", "p1", InteractionType::Purchase).with_county("Nairobi"),
        );
        store.record_interaction(
            recent("u2", "p2", InteractionType::Purchase).with_county("Nairobi"),
        );
        store.record_interaction(
            recent("u3", "p2", InteractionType::Purchase).with_county("Mombasa"),
        );
        let orchestrator = RecommendationOrchestrator::new(Arc::new(store));

        let response = orchestrator.recommend(
            &RecommendationRequest::trending()
                .with_n(10)
                .with_county("Nairobi")
                .with_category("fashion"),
        );
        let ids: Vec<&str> = response
            .items
            .iter()
            .map(|item| item.product_id.as_str())
            .collect();
        assert_eq!(ids, vec!["p2"]);
        // Only the Nairobi purchase counts.
        assert!((response.items[0].score - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_requests_hit_cache_consistently() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let first = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 5));
        let second = orchestrator.recommend(&user_request("u1", Algorithm::UserBased, 5));
        assert_eq!(first, second);
    }

    // ========================================================================
    // Training lifecycle
    // ========================================================================

    #[test]
    fn test_should_retrain_transitions() {
        let orchestrator = build_orchestrator();
        assert!(orchestrator.should_retrain());

        orchestrator.train().unwrap();
        assert!(!orchestrator.should_retrain());
    }

    #[test]
    fn test_version_increments_per_training_run() {
        let orchestrator = build_orchestrator();
        assert_eq!(orchestrator.model_version(), None);

        orchestrator.train().unwrap();
        assert_eq!(orchestrator.model_version(), Some(1));

        orchestrator.train().unwrap();
        assert_eq!(orchestrator.model_version(), Some(2));
    }

    #[test]
    fn test_concurrent_training_publishes_distinct_versions() {
        let orchestrator = build_orchestrator();
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| orchestrator.train().unwrap());
            }
        });
        assert_eq!(orchestrator.model_version(), Some(2));
    }

    #[test]
    fn test_training_on_empty_store_fails_without_snapshot() {
        let orchestrator = Arc::new(RecommendationOrchestrator::new(Arc::new(DataStore::new())));
        assert!(orchestrator.train().is_err());
        assert_eq!(orchestrator.model_version(), None);
    }

    #[tokio::test]
    async fn test_train_with_timeout_succeeds() {
        let orchestrator = build_orchestrator();
        orchestrator.train_with_timeout().await.unwrap();
        assert_eq!(orchestrator.model_version(), Some(1));
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    #[test]
    fn test_save_and_load_models() {
        let orchestrator = build_orchestrator();
        orchestrator.train().unwrap();

        let dir = std::env::temp_dir().join("orchestrator_models_test");
        orchestrator.save_models(&dir).unwrap();

        let reloaded = Arc::new(
            RecommendationOrchestrator::new(build_test_store())
                .with_cache(Arc::new(crate::cache::NoopCache)),
        );
        reloaded.load_models(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(reloaded.model_version(), Some(1));
        let request = RecommendationRequest::for_product("p1", Algorithm::ItemBased).with_n(2);
        assert_eq!(
            orchestrator.recommend(&request),
            reloaded.recommend(&request)
        );
    }

    #[test]
    fn test_save_without_training_fails() {
        let orchestrator = build_orchestrator();
        let dir = std::env::temp_dir().join("orchestrator_no_models_test");
        assert!(orchestrator.save_models(&dir).is_err());
    }
}
