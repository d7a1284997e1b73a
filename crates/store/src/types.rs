//! Core domain types for the recommendation subsystem.
//!
//! Interaction and Product are deliberately explicit typed records rather
//! than loose maps: a typo in a field name should be a compile error, not a
//! silently-defaulted value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with product IDs

/// Unique identifier for a user.
pub type UserId = String;

/// Unique identifier for a product.
pub type ProductId = String;

// =============================================================================
// Interaction Types
// =============================================================================

/// Kind of recorded user-product event.
///
/// `Other` absorbs event types this subsystem does not know about; weighting
/// treats them as plain views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Click,
    AddToCart,
    Wishlist,
    Purchase,
    Review,
    #[serde(other)]
    Other,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Click => "click",
            InteractionType::AddToCart => "add_to_cart",
            InteractionType::Wishlist => "wishlist",
            InteractionType::Purchase => "purchase",
            InteractionType::Review => "review",
            InteractionType::Other => "other",
        }
    }
}

/// A single recorded user-product event. Immutable once recorded; the store
/// keeps these in an append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub interaction_type: InteractionType,
    /// Star rating in [1, 5], present for purchases/reviews.
    #[serde(default)]
    pub rating: Option<f32>,
    pub timestamp: DateTime<Utc>,
    /// County the request originated from (e.g. "Nairobi").
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// mobile, desktop, tablet
    #[serde(default)]
    pub device_type: Option<String>,
    /// Where the user came from: recommendation, search, trending, ...
    #[serde(default)]
    pub came_from: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Interaction {
    /// Minimal constructor for the common case; context fields default.
    pub fn new(
        user_id: impl Into<UserId>,
        product_id: impl Into<ProductId>,
        interaction_type: InteractionType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            product_id: product_id.into(),
            interaction_type,
            rating: None,
            timestamp,
            county: None,
            language: default_language(),
            session_id: None,
            device_type: None,
            came_from: None,
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }
}

// =============================================================================
// Product Types
// =============================================================================

/// Catalog product metadata consumed by the hybrid engine's feature tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub brand: String,
    /// Price in KES.
    pub price: f64,
    /// Mean star rating across reviews, 0.0 when unrated.
    #[serde(default)]
    pub average_rating: f32,
    #[serde(default)]
    pub county: Option<String>,
}

// =============================================================================
// Dataset container
// =============================================================================

/// On-disk dataset format: the product catalog plus the interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub products: Vec<Product>,
    pub interactions: Vec<Interaction>,
}
