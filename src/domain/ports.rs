use crate::domain::errors::PipelineError;
use crate::domain::ingestion::IngestionRequest;
use crate::domain::optimization_config::OptimizationConfig;
use crate::domain::report::OptimizationReport;
use crate::domain::types::{AssetListing, MarketBar, NewsItem};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

// Need async_trait for async functions in traits
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// One 1-based page of the top-by-market-cap listing.
    async fn top_assets(&self, page: u32, limit: usize, currency: &str)
        -> Result<Vec<AssetListing>>;

    /// Daily bars for the listed asset, oldest first, at most `limit` days.
    async fn daily_history(
        &self,
        listing: &AssetListing,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<MarketBar>>;
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Articles for the requested 1-based pages of the feed.
    async fn fetch_news(&self, pages: &[u32]) -> Result<Vec<NewsItem>>;
}

/// Stage 1: pulls raw market and news data into the artifact store.
#[async_trait]
pub trait IngestionStage: Send + Sync {
    async fn ingest(&self, request: &IngestionRequest) -> Result<(), PipelineError>;
}

/// Stage 2: turns raw datasets into the feature matrix written under `out_dir`.
pub trait FeatureStage: Send + Sync {
    fn build_features(
        &self,
        market_csv: &Path,
        news_csv: &Path,
        out_dir: &Path,
    ) -> Result<(), PipelineError>;
}

/// Stage 3: optimizes weights, backtests them and persists the report.
pub trait OptimizationStage: Send + Sync {
    fn run_optimization_analysis(
        &self,
        config: &OptimizationConfig,
        feature_matrix: &Path,
    ) -> Result<OptimizationReport, PipelineError>;
}
