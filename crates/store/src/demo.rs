//! Deterministic demo dataset generation.
//!
//! Produces a synthetic product catalog and interaction log for the CLI and
//! benches. Generation is seeded, so the same parameters always yield the
//! same dataset.

use crate::types::{Dataset, Interaction, InteractionType, Product};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CATEGORIES: &[&str] = &[
    "electronics",
    "fashion",
    "groceries",
    "beauty",
    "home",
    "sports",
];

const BRANDS: &[&str] = &[
    "Samsung", "Infinix", "Tecno", "JBL", "Bata", "Unga", "Nivea", "Ramtons",
];

const COUNTIES: &[&str] = &["Nairobi", "Mombasa", "Kisumu", "Nakuru", "Eldoret"];

// Weighted toward weak signals, the way real traffic skews.
const INTERACTION_MIX: &[(InteractionType, u32)] = &[
    (InteractionType::View, 50),
    (InteractionType::Click, 20),
    (InteractionType::AddToCart, 10),
    (InteractionType::Wishlist, 8),
    (InteractionType::Purchase, 7),
    (InteractionType::Review, 5),
];

/// Generate a seeded synthetic dataset.
pub fn generate_dataset(
    n_users: usize,
    n_products: usize,
    n_interactions: usize,
    seed: u64,
) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let now = Utc::now();

    let products: Vec<Product> = (0..n_products)
        .map(|i| {
            let category = CATEGORIES[i % CATEGORIES.len()];
            let brand = BRANDS[rng.random_range(0..BRANDS.len())];
            Product {
                id: format!("prod-{:03}", i),
                name: format!("{} {} {}", brand, category, i),
                category: category.to_string(),
                brand: brand.to_string(),
                price: rng.random_range(100.0..40_000.0_f64).round(),
                average_rating: (rng.random_range(20..=50) as f32) / 10.0,
                county: Some(COUNTIES[rng.random_range(0..COUNTIES.len())].to_string()),
            }
        })
        .collect();

    let mix_total: u32 = INTERACTION_MIX.iter().map(|(_, w)| w).sum();
    let interactions: Vec<Interaction> = (0..n_interactions)
        .map(|_| {
            let user = format!("user-{:03}", rng.random_range(0..n_users));
            let product = &products[rng.random_range(0..products.len())];
            let kind = pick_interaction_type(&mut rng, mix_total);
            let age_hours = rng.random_range(0..24 * 30);
            let mut interaction = Interaction::new(
                user,
                product.id.clone(),
                kind,
                now - Duration::hours(age_hours),
            )
            .with_county(COUNTIES[rng.random_range(0..COUNTIES.len())]);
            if matches!(kind, InteractionType::Purchase | InteractionType::Review) {
                interaction.rating = Some((rng.random_range(10..=50) as f32) / 10.0);
            }
            interaction
        })
        .collect();

    Dataset {
        products,
        interactions,
    }
}

fn pick_interaction_type(rng: &mut StdRng, mix_total: u32) -> InteractionType {
    let mut roll = rng.random_range(0..mix_total);
    for &(kind, weight) in INTERACTION_MIX {
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    InteractionType::View
}
