//! Trending products over sliding time windows.
//!
//! Stateless popularity scoring straight off the interaction log: no
//! training, so it is always available and serves as the fallback input
//! when personalized engines cannot answer. Each interaction inside the
//! window contributes a recency-free popularity weight; heavier signals
//! (purchases) count an order of magnitude more than views.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use store::{DataStore, Interaction, InteractionType, ProductId};
use tracing::instrument;

/// Sliding window over the interaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeWindow {
    /// Parse a window label; unknown labels fall back to 24h.
    pub fn parse(label: &str) -> Self {
        match label {
            "1h" => TimeWindow::Hour,
            "24h" => TimeWindow::Day,
            "7d" => TimeWindow::Week,
            "30d" => TimeWindow::Month,
            _ => TimeWindow::Day,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "1h",
            TimeWindow::Day => "24h",
            TimeWindow::Week => "7d",
            TimeWindow::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Hour => Duration::hours(1),
            TimeWindow::Day => Duration::hours(24),
            TimeWindow::Week => Duration::days(7),
            TimeWindow::Month => Duration::days(30),
        }
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Day
    }
}

/// Popularity weight of an interaction type for trending purposes. This is
/// a separate scale from the affinity weighting the trainable engines use:
/// trending measures traffic, not preference, so a review counts like any
/// other single event.
pub fn trending_weight(kind: InteractionType) -> f32 {
    match kind {
        InteractionType::View => 1.0,
        InteractionType::Click => 2.0,
        InteractionType::Wishlist => 3.0,
        InteractionType::AddToCart => 5.0,
        InteractionType::Purchase => 10.0,
        InteractionType::Review | InteractionType::Other => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct TrendingScorer {
    store: Arc<DataStore>,
}

impl TrendingScorer {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    /// Top-n trending products within the window, ending now.
    pub fn trending(&self, window: TimeWindow, n: usize) -> Vec<(ProductId, f32)> {
        self.trending_at(Utc::now(), window, n, |_| true)
    }

    /// Trending restricted to interactions from one county.
    pub fn trending_in_county(
        &self,
        county: &str,
        window: TimeWindow,
        n: usize,
    ) -> Vec<(ProductId, f32)> {
        self.trending_filtered(window, n, Some(county), None)
    }

    /// Trending restricted to products in one category.
    pub fn trending_in_category(
        &self,
        category: &str,
        window: TimeWindow,
        n: usize,
    ) -> Vec<(ProductId, f32)> {
        self.trending_filtered(window, n, None, Some(category))
    }

    /// Trending with optional county and category filters; when both are
    /// given, an interaction must satisfy both.
    pub fn trending_filtered(
        &self,
        window: TimeWindow,
        n: usize,
        county: Option<&str>,
        category: Option<&str>,
    ) -> Vec<(ProductId, f32)> {
        let members: Option<Vec<ProductId>> =
            category.map(|category| self.store.products_in_category(category).to_vec());
        self.trending_at(Utc::now(), window, n, |interaction| {
            county.is_none_or(|county| interaction.county.as_deref() == Some(county))
                && members
                    .as_ref()
                    .is_none_or(|members| members.contains(&interaction.product_id))
        })
    }

    /// Core scorer with an explicit clock, so windows are testable.
    /// Ties keep the first-encounter order of products in the log.
    #[instrument(skip(self, keep), fields(window = window.as_str()))]
    pub fn trending_at(
        &self,
        now: DateTime<Utc>,
        window: TimeWindow,
        n: usize,
        keep: impl Fn(&Interaction) -> bool,
    ) -> Vec<(ProductId, f32)> {
        let cutoff = now - window.duration();
        let mut order: Vec<ProductId> = Vec::new();
        let mut scores: HashMap<ProductId, f32> = HashMap::new();

        for interaction in self.store.interactions() {
            if interaction.timestamp < cutoff || interaction.timestamp > now {
                continue;
            }
            if !keep(interaction) {
                continue;
            }
            if !scores.contains_key(&interaction.product_id) {
                order.push(interaction.product_id.clone());
            }
            *scores.entry(interaction.product_id.clone()).or_insert(0.0) +=
                trending_weight(interaction.interaction_type);
        }

        let mut ranked: Vec<(ProductId, f32)> = order
            .into_iter()
            .map(|id| {
                let score = scores[&id];
                (id, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);
        ranked
    }
}
