//! Stage 2: feature engineering over the raw datasets.

mod indicators;
mod sentiment;
mod service;

pub use indicators::{MIN_HISTORY_DAYS, asset_features};
pub use sentiment::{DailySentiment, MOOD_WINDOW_DAYS, market_mood};
pub use service::FeatureEngineeringService;
