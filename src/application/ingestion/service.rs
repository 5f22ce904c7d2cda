use crate::domain::artifacts::ArtifactId;
use crate::domain::errors::PipelineError;
use crate::domain::ingestion::IngestionRequest;
use crate::domain::ports::{IngestionStage, MarketDataProvider, NewsProvider};
use crate::domain::types::{AssetListing, MarketBar, NewsItem};
use crate::infrastructure::artifact_store::{ArtifactBatch, ArtifactStore};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Concurrent daily-history requests in flight.
pub const HISTORY_CONCURRENCY: usize = 4;

pub struct IngestionService {
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
}

impl IngestionService {
    pub fn new(market: Arc<dyn MarketDataProvider>, news: Arc<dyn NewsProvider>) -> Self {
        Self { market, news }
    }

    async fn list_universe(
        &self,
        request: &IngestionRequest,
    ) -> Result<Vec<AssetListing>, PipelineError> {
        let mut seen = HashSet::new();
        let mut universe = Vec::new();

        for &page in &request.pages {
            if universe.len() >= request.top_limit {
                debug!("Universe full at {} assets, skipping page {}", universe.len(), page);
                break;
            }
            let listings = self
                .market
                .top_assets(page, request.top_limit, &request.currency)
                .await
                .map_err(|e| PipelineError::ingestion(format!("{:#}", e)))?;
            debug!("Listing page {} returned {} assets", page, listings.len());

            universe.extend(
                listings
                    .into_iter()
                    .filter(|listing| seen.insert(listing.symbol.clone())),
            );
        }

        universe.truncate(request.top_limit);
        Ok(universe)
    }

    async fn fetch_history(
        &self,
        universe: &[AssetListing],
        request: &IngestionRequest,
    ) -> Result<Vec<MarketBar>, PipelineError> {
        // Boxed so the `ingest` future stays `Send`
        let requests: Vec<BoxFuture<'_, Result<Vec<MarketBar>, PipelineError>>> = universe
            .iter()
            .map(|listing| {
                Box::pin(async move {
                    self.market
                        .daily_history(listing, &request.currency, request.history_limit)
                        .await
                        .map_err(|e| PipelineError::ingestion(format!("{:#}", e)))
                }) as BoxFuture<'_, _>
            })
            .collect();

        let histories: Vec<Vec<MarketBar>> = stream::iter(requests)
            .buffered(HISTORY_CONCURRENCY)
            .try_collect()
            .await?;

        let mut bars = Vec::new();
        for (listing, history) in universe.iter().zip(histories) {
            if history.is_empty() {
                warn!("No daily history for {}, skipping", listing.symbol);
                continue;
            }
            bars.extend(history);
        }
        Ok(bars)
    }

    async fn fetch_news(&self, request: &IngestionRequest) -> Result<Vec<NewsItem>, PipelineError> {
        let mut items = self
            .news
            .fetch_news(&request.pages)
            .await
            .map_err(|e| PipelineError::ingestion(format!("{:#}", e)))?;

        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id.clone()));
        // RFC 3339 in UTC sorts lexicographically; ties keep feed order
        items.sort_by(|a, b| a.published_at.cmp(&b.published_at));
        Ok(items)
    }
}

#[async_trait]
impl IngestionStage for IngestionService {
    async fn ingest(&self, request: &IngestionRequest) -> Result<(), PipelineError> {
        request.validate()?;
        info!(
            "Stage 1: ingesting {:?} data for pages {:?} (top {}, {} days, {})",
            request.mode, request.pages, request.top_limit, request.history_limit, request.currency
        );

        let universe = self.list_universe(request).await?;
        if universe.is_empty() {
            return Err(PipelineError::ingestion("market provider listed no assets"));
        }

        let bars = self.fetch_history(&universe, request).await?;
        if bars.is_empty() {
            return Err(PipelineError::ingestion(
                "market provider returned no daily history",
            ));
        }

        let news = self.fetch_news(request).await?;
        if news.is_empty() {
            return Err(PipelineError::ingestion("news provider returned no articles"));
        }

        let store = ArtifactStore::new(&request.base_dir);
        let mut batch = ArtifactBatch::new();
        batch.add(store.path(ArtifactId::MarketRaw), ArtifactId::MarketRaw, &bars)?;
        batch.add(store.path(ArtifactId::NewsRaw), ArtifactId::NewsRaw, &news)?;
        batch.commit()?;

        info!(
            "Stage 1: stored {} bars for {} assets and {} articles",
            bars.len(),
            universe.len(),
            news.len()
        );
        Ok(())
    }
}
