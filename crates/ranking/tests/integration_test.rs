//! Integration tests for the ranking layer.
//!
//! These tests verify that trending scoring and context boosts work
//! together in a realistic scenario: score the log, then rescale by the
//! request context.

use chrono::{Duration, Utc};
use ranking::{BoostPipeline, RequestContext, Season, TimeOfDay, TimeWindow, TrendingScorer};
use std::sync::Arc;
use store::{DataStore, Interaction, InteractionType, Product};

fn create_test_store() -> Arc<DataStore> {
    let mut store = DataStore::new();

    store.insert_product(Product {
        id: "radio".to_string(),
        name: "FM Radio".to_string(),
        category: "electronics".to_string(),
        brand: "Tecno".to_string(),
        price: 1500.0,
        average_rating: 4.3,
        county: Some("Nairobi".to_string()),
    });
    store.insert_product(Product {
        id: "shirt".to_string(),
        name: "Cotton Shirt".to_string(),
        category: "fashion".to_string(),
        brand: "Bata".to_string(),
        price: 800.0,
        average_rating: 4.0,
        county: Some("Mombasa".to_string()),
    });
    store.insert_product(Product {
        id: "flour".to_string(),
        name: "Maize Flour 2kg".to_string(),
        category: "groceries".to_string(),
        brand: "Unga".to_string(),
        price: 180.0,
        average_rating: 4.5,
        county: Some("Nairobi".to_string()),
    });

    let now = Utc::now();
    // shirt leads on raw traffic: 2 purchases = 20
    store.record_interaction(Interaction::new(
        "u1",
        "shirt",
        InteractionType::Purchase,
        now - Duration::hours(2),
    ));
    store.record_interaction(Interaction::new(
        "u2",
        "shirt",
        InteractionType::Purchase,
        now - Duration::hours(3),
    ));
    // radio: purchase + add_to_cart + click = 17
    store.record_interaction(Interaction::new(
        "u3",
        "radio",
        InteractionType::Purchase,
        now - Duration::hours(1),
    ));
    store.record_interaction(Interaction::new(
        "u4",
        "radio",
        InteractionType::AddToCart,
        now - Duration::hours(4),
    ));
    store.record_interaction(Interaction::new(
        "u5",
        "radio",
        InteractionType::Click,
        now - Duration::hours(5),
    ));
    // flour: only old traffic, outside the 24h window
    store.record_interaction(Interaction::new(
        "u6",
        "flour",
        InteractionType::Purchase,
        now - Duration::days(3),
    ));

    Arc::new(store)
}

#[test]
fn test_trending_then_boost_scales_scores_uniformly() {
    let store = create_test_store();
    let scorer = TrendingScorer::new(store);
    let pipeline = BoostPipeline::standard();

    let trending = scorer.trending(TimeWindow::Day, 10);
    assert_eq!(trending.len(), 2);
    assert_eq!(trending[0].0, "shirt"); // 20 beats 17

    // A Nairobi morning scales everything by 1.2 * 1.3; the ranking
    // itself is unchanged.
    let ctx = RequestContext::new()
        .with_time_of_day(TimeOfDay::Morning)
        .with_county("Nairobi");
    let boosted = pipeline.apply(trending, &ctx, 10);

    assert_eq!(boosted[0].0, "shirt");
    assert!((boosted[0].1 - 20.0 * 1.56).abs() < 1e-3);
    assert!((boosted[1].1 - 17.0 * 1.56).abs() < 1e-3);
}

#[test]
fn test_wider_window_recovers_stale_products() {
    let store = create_test_store();
    let scorer = TrendingScorer::new(store);

    let day = scorer.trending(TimeWindow::Day, 10);
    assert!(day.iter().all(|(id, _)| id != "flour"));

    let week = scorer.trending(TimeWindow::Week, 10);
    assert!(week.iter().any(|(id, _)| id == "flour"));
}

#[test]
fn test_category_trending_with_seasonal_boost() {
    let store = create_test_store();
    let scorer = TrendingScorer::new(store);
    let pipeline = BoostPipeline::standard();

    let electronics = scorer.trending_in_category("electronics", TimeWindow::Day, 10);
    assert_eq!(electronics.len(), 1);
    assert_eq!(electronics[0].0, "radio");

    let ctx = RequestContext::new().with_season(Season::Festive);
    let boosted = pipeline.apply(electronics, &ctx, 10);
    assert!((boosted[0].1 - 17.0 * 1.3).abs() < 1e-3);
}
