//! Request and response types for the recommendation service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ranking::{RequestContext, TimeWindow};
use store::{ProductId, UserId};

/// Which strategy should answer the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    UserBased,
    ItemBased,
    Hybrid,
    MatrixFactorization,
    Trending,
    ContextAware,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::UserBased => "user_based",
            Algorithm::ItemBased => "item_based",
            Algorithm::Hybrid => "hybrid",
            Algorithm::MatrixFactorization => "matrix_factorization",
            Algorithm::Trending => "trending",
            Algorithm::ContextAware => "context_aware",
        }
    }

    pub const ALL: [Algorithm; 6] = [
        Algorithm::UserBased,
        Algorithm::ItemBased,
        Algorithm::Hybrid,
        Algorithm::MatrixFactorization,
        Algorithm::Trending,
        Algorithm::ContextAware,
    ];
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::UserBased
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown algorithm '{0}', expected user_based | item_based | hybrid | matrix_factorization | trending | context_aware"
)]
pub struct ParseAlgorithmError(String);

impl FromStr for Algorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_based" | "collaborative" | "cf" => Ok(Algorithm::UserBased),
            "item_based" | "similar" => Ok(Algorithm::ItemBased),
            "hybrid" => Ok(Algorithm::Hybrid),
            "matrix_factorization" | "svd" => Ok(Algorithm::MatrixFactorization),
            "trending" => Ok(Algorithm::Trending),
            "context_aware" | "contextual" => Ok(Algorithm::ContextAware),
            other => Err(ParseAlgorithmError(other.to_string())),
        }
    }
}

/// What the recommendations should be anchored on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    User(UserId),
    Product(ProductId),
    Basket(Vec<ProductId>),
}

/// A recommendation request. Build with the `for_*` constructors and the
/// `with_*` modifiers; `window`, `county`, and `category` only apply to
/// trending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub target: Target,
    pub algorithm: Algorithm,
    pub n: usize,
    #[serde(default)]
    pub context: Option<RequestContext>,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

pub const DEFAULT_RESULT_COUNT: usize = 10;

impl RecommendationRequest {
    pub fn for_user(user_id: impl Into<UserId>, algorithm: Algorithm) -> Self {
        Self::new(Target::User(user_id.into()), algorithm)
    }

    pub fn for_product(product_id: impl Into<ProductId>, algorithm: Algorithm) -> Self {
        Self::new(Target::Product(product_id.into()), algorithm)
    }

    pub fn for_basket(basket: Vec<ProductId>) -> Self {
        Self::new(Target::Basket(basket), Algorithm::ItemBased)
    }

    pub fn trending() -> Self {
        Self::new(Target::Basket(Vec::new()), Algorithm::Trending)
    }

    fn new(target: Target, algorithm: Algorithm) -> Self {
        Self {
            target,
            algorithm,
            n: DEFAULT_RESULT_COUNT,
            context: None,
            window: None,
            county: None,
            category: None,
        }
    }

    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One scored product in a response. `algorithm` records which scorer
/// actually produced the score, which matters when a request fell back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub product_id: ProductId,
    pub score: f32,
    pub algorithm: String,
}

impl RecommendedItem {
    pub fn new(product_id: impl Into<ProductId>, score: f32, algorithm: &str) -> Self {
        Self {
            product_id: product_id.into(),
            score,
            algorithm: algorithm.to_string(),
        }
    }
}

/// Ordered recommendations plus a human-readable account of how they
/// were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub items: Vec<RecommendedItem>,
    pub explanation: String,
}

impl RecommendationResponse {
    pub fn new(items: Vec<RecommendedItem>, explanation: impl Into<String>) -> Self {
        Self {
            items,
            explanation: explanation.into(),
        }
    }
}
