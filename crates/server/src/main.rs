//! Demo harness for the recommendation orchestrator.
//!
//! Generates a synthetic dataset, trains all engines, and walks through the
//! serving paths end to end. Useful for eyeballing behavior without wiring
//! up a real catalog.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use ranking::{RequestContext, TimeOfDay, TimeWindow};
use server::{Algorithm, RecommendationOrchestrator, RecommendationRequest};
use store::{demo, DataStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,server=debug,engines=debug,ranking=debug")
        .init();

    info!("Generating demo dataset");
    let dataset = demo::generate_dataset(200, 60, 8_000, 42);
    let store = Arc::new(DataStore::from_dataset(dataset));
    store.validate()?;

    let orchestrator = Arc::new(RecommendationOrchestrator::new(store));

    info!("Training all engines");
    orchestrator.train_with_timeout().await?;
    info!(version = ?orchestrator.model_version(), "Training complete");

    let user_id = "user-001";
    for algorithm in [
        Algorithm::UserBased,
        Algorithm::MatrixFactorization,
        Algorithm::Hybrid,
    ] {
        let response = orchestrator
            .recommend(&RecommendationRequest::for_user(user_id, algorithm).with_n(5));
        info!("Top picks for {} via {}: {}", user_id, algorithm, response.explanation);
        for (i, item) in response.items.iter().enumerate() {
            info!(
                "  {}. {} (score {:.3}, {})",
                i + 1,
                item.product_id,
                item.score,
                item.algorithm
            );
        }
    }

    let ctx = RequestContext::new()
        .with_time_of_day(TimeOfDay::Morning)
        .with_county("Nairobi");
    let boosted = orchestrator.recommend(
        &RecommendationRequest::for_user(user_id, Algorithm::ContextAware)
            .with_n(5)
            .with_context(ctx),
    );
    info!("Context-aware picks for a Nairobi morning: {}", boosted.explanation);
    for item in &boosted.items {
        info!("  {} (score {:.3})", item.product_id, item.score);
    }

    let trending = orchestrator.recommend(
        &RecommendationRequest::trending()
            .with_n(5)
            .with_window(TimeWindow::Week),
    );
    if let Some(top) = trending.items.first() {
        let similar = orchestrator.recommend(
            &RecommendationRequest::for_product(&top.product_id, Algorithm::ItemBased).with_n(5),
        );
        info!("Products similar to this week's top item {}:", top.product_id);
        for item in &similar.items {
            info!("  {} (score {:.3})", item.product_id, item.score);
        }
    }

    Ok(())
}
