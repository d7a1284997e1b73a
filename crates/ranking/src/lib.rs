//! Ranking layer: trending popularity and context-aware boosts.
//!
//! Unlike the trainable engines, everything here is stateless over the
//! shared [`store::DataStore`]: trending reads the interaction log
//! directly, and boosts rescale an already-ranked list using the request
//! context. Both are cheap enough to run on every request.

pub mod context;
pub mod trending;

pub use context::{
    Boost, BoostPipeline, CountyBoost, RequestContext, Season, SeasonBoost, TimeOfDay,
    TimeOfDayBoost,
};
pub use trending::{trending_weight, TimeWindow, TrendingScorer};
