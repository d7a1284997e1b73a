//! Context-aware score boosts.
//!
//! Post-ranking multipliers applied to an engine's output given the
//! request context (time of day, county, season). Boosts are multiplicative
//! and composable: a morning request with a county present scales every
//! score by 1.2 * 1.3. Boosts depend only on the request context, never on
//! the scored item, so they rescale uniformly; the re-sort after boosting
//! keeps the contract honest should a non-uniform boost be added.

use serde::{Deserialize, Serialize};
use store::ProductId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// Seasonal shopping modes; rainy weather keeps shoppers indoors and
/// online, festive peaks cover December and Eid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Rainy,
    Festive,
}

/// Ambient facts about the request. All fields optional; absent fields
/// contribute no boost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub season: Option<Season>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = Some(time_of_day);
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }
}

/// A single multiplicative boost derived from the request context.
pub trait Boost: Send + Sync {
    fn name(&self) -> &'static str;
    fn factor(&self, ctx: &RequestContext) -> f32;
}

/// Morning traffic converts best, evening second.
pub struct TimeOfDayBoost;

impl Boost for TimeOfDayBoost {
    fn name(&self) -> &'static str {
        "time_of_day"
    }

    fn factor(&self, ctx: &RequestContext) -> f32 {
        match ctx.time_of_day {
            Some(TimeOfDay::Morning) => 1.2,
            Some(TimeOfDay::Evening) => 1.1,
            _ => 1.0,
        }
    }
}

/// A request that localizes itself to a county gets the local-relevance
/// bump.
pub struct CountyBoost;

impl Boost for CountyBoost {
    fn name(&self) -> &'static str {
        "county"
    }

    fn factor(&self, ctx: &RequestContext) -> f32 {
        if ctx.county.is_some() { 1.3 } else { 1.0 }
    }
}

pub struct SeasonBoost;

impl Boost for SeasonBoost {
    fn name(&self) -> &'static str {
        "season"
    }

    fn factor(&self, ctx: &RequestContext) -> f32 {
        match ctx.season {
            Some(Season::Rainy) => 1.2,
            Some(Season::Festive) => 1.3,
            None => 1.0,
        }
    }
}

/// Ordered chain of boosts applied to a ranked list.
#[derive(Default)]
pub struct BoostPipeline {
    boosts: Vec<Box<dyn Boost>>,
}

impl BoostPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_boost(mut self, boost: Box<dyn Boost>) -> Self {
        self.boosts.push(boost);
        self
    }

    /// The standard chain: time of day, county, season.
    pub fn standard() -> Self {
        Self::new()
            .add_boost(Box::new(TimeOfDayBoost))
            .add_boost(Box::new(CountyBoost))
            .add_boost(Box::new(SeasonBoost))
    }

    /// Combined multiplier for a request context.
    pub fn combined_factor(&self, ctx: &RequestContext) -> f32 {
        self.boosts.iter().map(|boost| boost.factor(ctx)).product()
    }

    /// Scale every score by the product of all boost factors, then re-rank
    /// (stable on ties) and truncate to n.
    pub fn apply(
        &self,
        recommendations: Vec<(ProductId, f32)>,
        ctx: &RequestContext,
        n: usize,
    ) -> Vec<(ProductId, f32)> {
        let factor = self.combined_factor(ctx);
        if factor != 1.0 {
            debug!(factor, "Applying context boost");
        }
        let mut boosted: Vec<(ProductId, f32)> = recommendations
            .into_iter()
            .map(|(product_id, score)| (product_id, score * factor))
            .collect();
        boosted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        boosted.truncate(n);
        boosted
    }
}
