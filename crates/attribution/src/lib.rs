//! Multi-touch attribution — weighting models, per-clinic config resolution,
//! and the passive attribution resolver.

pub mod config;
pub mod models;
pub mod resolver;

pub use config::EffectiveAttributionConfig;
pub use models::{pick_winner, weigh_touches, WeightedTouch};
pub use resolver::{AttributionOutcome, AttributionResolver};
