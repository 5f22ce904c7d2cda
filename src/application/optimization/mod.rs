//! Stage 3: portfolio optimization, backtest and reporting.

pub mod allocator;
pub mod backtest;
pub mod runner;

pub use allocator::{AssetSignal, mean_variance_weights, select_candidates};
pub use backtest::{BENCHMARK, FeaturePanel, REBALANCE_EVERY_DAYS};
pub use runner::{OptimizationRunner, OptimizationService};
