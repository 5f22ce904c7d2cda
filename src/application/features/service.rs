use crate::application::features::indicators::asset_features;
use crate::application::features::sentiment::{DailySentiment, market_mood};
use crate::domain::artifacts::ArtifactId;
use crate::domain::errors::{ArtifactError, PipelineError};
use crate::domain::ports::FeatureStage;
use crate::domain::types::{FeatureRow, MarketBar, NewsItem};
use crate::infrastructure::artifact_store::{ArtifactBatch, ArtifactStore, read_csv};
use crate::infrastructure::news::SentimentAnalyzer;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct FeatureEngineeringService {
    analyzer: SentimentAnalyzer,
    store: Option<ArtifactStore>,
}

impl FeatureEngineeringService {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentAnalyzer::new(),
            store: None,
        }
    }

    /// Writes the market mood into `store` instead of the store that
    /// contains `out_dir`.
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    fn mood_path(&self, out_dir: &Path) -> PathBuf {
        match &self.store {
            Some(store) => store.path(ArtifactId::MarketMood),
            None => ArtifactStore::new(out_dir.parent().unwrap_or_else(|| Path::new(".")))
                .path(ArtifactId::MarketMood),
        }
    }

    /// Groups bars per symbol, sorted by date, one bar per day.
    fn group_by_asset(bars: Vec<MarketBar>) -> Result<Vec<(String, Vec<MarketBar>)>, ArtifactError> {
        let mut groups: BTreeMap<String, BTreeMap<chrono::NaiveDate, MarketBar>> = BTreeMap::new();
        for bar in bars {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(ArtifactError::Malformed {
                    name: ArtifactId::MarketRaw.spec().logical_name,
                    reason: format!("{} on {} has close {}", bar.symbol, bar.date, bar.close),
                });
            }
            groups
                .entry(bar.symbol.clone())
                .or_default()
                .insert(bar.date, bar);
        }

        Ok(groups
            .into_iter()
            .map(|(symbol, days)| (symbol, days.into_values().collect()))
            .collect())
    }
}

impl Default for FeatureEngineeringService {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStage for FeatureEngineeringService {
    fn build_features(
        &self,
        market_csv: &Path,
        news_csv: &Path,
        out_dir: &Path,
    ) -> Result<(), PipelineError> {
        let bars: Vec<MarketBar> = read_csv(market_csv, ArtifactId::MarketRaw.spec())?;
        let news: Vec<NewsItem> = read_csv(news_csv, ArtifactId::NewsRaw.spec())?;
        info!(
            "Stage 2: building features from {} bars and {} articles",
            bars.len(),
            news.len()
        );

        let scores: Vec<f64> = news.par_iter().map(|item| self.analyzer.score(item)).collect();
        let daily = DailySentiment::from_scored(&news, &scores);

        let groups = Self::group_by_asset(bars)?;
        let per_asset: Vec<Vec<FeatureRow>> = groups
            .par_iter()
            .map(|(symbol, bars)| asset_features(symbol, bars, &daily))
            .collect::<Result<_, String>>()
            .map_err(|reason| PipelineError::FeatureEngineering { reason })?;

        for ((symbol, _), rows) in groups.iter().zip(&per_asset) {
            if rows.is_empty() {
                warn!("{} has too little history for features, skipping", symbol);
            }
        }

        let mut matrix: Vec<FeatureRow> = per_asset.into_iter().flatten().collect();
        if matrix.is_empty() {
            return Err(PipelineError::FeatureEngineering {
                reason: "no asset has enough history to produce features".to_string(),
            });
        }
        matrix.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.asset.cmp(&b.asset)));

        let mood = market_mood(&news, &scores).ok_or_else(|| PipelineError::FeatureEngineering {
            reason: "no news article carries a valid publish date".to_string(),
        })?;

        let mut batch = ArtifactBatch::new();
        batch.add(
            out_dir.join(ArtifactId::FeatureMatrix.spec().file_name()),
            ArtifactId::FeatureMatrix,
            &matrix,
        )?;
        batch.add(
            self.mood_path(out_dir),
            ArtifactId::MarketMood,
            std::slice::from_ref(&mood),
        )?;
        batch.commit()?;

        info!(
            "Stage 2: wrote {} feature rows; market mood {:.1} over {} articles",
            matrix.len(),
            mood.market_sentiment_index,
            mood.news_count
        );
        Ok(())
    }
}
