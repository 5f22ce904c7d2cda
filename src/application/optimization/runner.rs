use crate::application::optimization::backtest::{
    FeaturePanel, latest_recommendations, run_backtest, summarize,
};
use crate::domain::artifacts::ArtifactId;
use crate::domain::errors::{OptimizationError, PipelineError};
use crate::domain::optimization_config::OptimizationConfig;
use crate::domain::ports::OptimizationStage;
use crate::domain::report::{CumulativeReturnRow, DrawdownRow, OptimizationReport};
use crate::domain::types::FeatureRow;
use crate::infrastructure::artifact_store::{ArtifactBatch, ArtifactStore, read_csv};
use std::path::Path;
use tracing::info;

/// Stage 3 for a single configuration.
pub struct OptimizationRunner {
    config: OptimizationConfig,
    store: Option<ArtifactStore>,
}

impl OptimizationRunner {
    pub fn new(config: OptimizationConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Writes outputs into `store` instead of next to the feature matrix.
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Computes recommendations, backtest and metrics from one snapshot of
    /// the matrix. Pure: nothing is written.
    pub fn analyze(&self, rows: &[FeatureRow]) -> Result<OptimizationReport, OptimizationError> {
        let panel = FeaturePanel::new(rows);
        let backtest = run_backtest(&panel, &self.config)?;
        let metrics = summarize(&backtest);
        let recommendations = latest_recommendations(&panel, &self.config)?;

        Ok(OptimizationReport {
            recommendations,
            backtest,
            metrics,
        })
    }

    pub fn run_optimization_analysis(
        &self,
        feature_matrix: &Path,
    ) -> Result<OptimizationReport, PipelineError> {
        self.config.validate()?;
        let rows: Vec<FeatureRow> = read_csv(feature_matrix, ArtifactId::FeatureMatrix.spec())?;
        info!(
            "Stage 3: optimizing {} feature rows (gamma {}, top {})",
            rows.len(),
            self.config.risk_aversion,
            self.config.universe_size_cap
        );

        let report = self.analyze(&rows)?;

        let store = self
            .store
            .clone()
            .unwrap_or_else(|| store_beside(feature_matrix));
        persist(&store, &report)?;

        info!(
            "Stage 3: {} recommendations, portfolio CAGR {:.2}% vs BTC {:.2}%",
            report.recommendations.len(),
            report.metrics.portfolio_cagr * 100.0,
            report.metrics.btc_cagr * 100.0
        );
        Ok(report)
    }
}

/// The store whose registered layout contains `feature_matrix`.
fn store_beside(feature_matrix: &Path) -> ArtifactStore {
    let base = feature_matrix
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    ArtifactStore::new(base)
}

fn persist(store: &ArtifactStore, report: &OptimizationReport) -> Result<(), PipelineError> {
    let cumulative: Vec<CumulativeReturnRow> = report.backtest.iter().map(Into::into).collect();
    let drawdown: Vec<DrawdownRow> = report.backtest.iter().map(Into::into).collect();

    let mut batch = ArtifactBatch::new();
    batch.add(
        store.path(ArtifactId::Recommendations),
        ArtifactId::Recommendations,
        &report.recommendations,
    )?;
    batch.add(
        store.path(ArtifactId::MetricsSummary),
        ArtifactId::MetricsSummary,
        std::slice::from_ref(&report.metrics),
    )?;
    batch.add(
        store.path(ArtifactId::CumulativeReturns),
        ArtifactId::CumulativeReturns,
        &cumulative,
    )?;
    batch.add(store.path(ArtifactId::Drawdown), ArtifactId::Drawdown, &drawdown)?;
    batch.commit()?;
    Ok(())
}

/// Stage 3 bound to an artifact store; the config arrives per run.
pub struct OptimizationService {
    store: ArtifactStore,
}

impl OptimizationService {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }
}

impl OptimizationStage for OptimizationService {
    fn run_optimization_analysis(
        &self,
        config: &OptimizationConfig,
        feature_matrix: &Path,
    ) -> Result<OptimizationReport, PipelineError> {
        OptimizationRunner::new(config.clone())
            .with_store(self.store.clone())
            .run_optimization_analysis(feature_matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{MetricsSummary, Recommendation};
    use chrono::{Duration, NaiveDate};

    fn write_matrix(store: &ArtifactStore, assets: &[&str], days: i64) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut rows = Vec::new();
        for d in 0..days {
            for (k, asset) in assets.iter().enumerate() {
                let phase = (d + k as i64) % 5;
                rows.push(FeatureRow {
                    date: start + Duration::days(d),
                    asset: asset.to_string(),
                    close: 100.0,
                    ret_1d: 0.004 * (phase as f64 - 2.0),
                    mom_7d: 0.01,
                    mom_30d: 0.05 + 0.02 * k as f64,
                    vol_30d: 0.02 + 0.005 * k as f64,
                    rsi_14: 55.0,
                    news_count: 0,
                    sentiment: 0.0,
                });
            }
        }
        let mut batch = ArtifactBatch::new();
        batch
            .add(store.path(ArtifactId::FeatureMatrix), ArtifactId::FeatureMatrix, &rows)
            .unwrap();
        batch.commit().unwrap();
    }

    #[test]
    fn test_analysis_persists_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_matrix(&store, &["BTC", "ETH", "SOL"], 40);

        let report = OptimizationRunner::new(OptimizationConfig::default())
            .run_optimization_analysis(&store.path(ArtifactId::FeatureMatrix))
            .unwrap();

        let recs: Vec<Recommendation> = store.read(ArtifactId::Recommendations).unwrap();
        let metrics: Vec<MetricsSummary> = store.read(ArtifactId::MetricsSummary).unwrap();
        let cumulative: Vec<CumulativeReturnRow> = store.read(ArtifactId::CumulativeReturns).unwrap();
        let drawdown: Vec<DrawdownRow> = store.read(ArtifactId::Drawdown).unwrap();

        assert_eq!(recs.len(), report.recommendations.len());
        assert_eq!(metrics.len(), 1);
        assert_eq!(cumulative.len(), 39);
        assert_eq!(drawdown.len(), 39);
    }

    #[test]
    fn test_missing_benchmark_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_matrix(&store, &["ETH", "SOL"], 20);

        let err = OptimizationRunner::new(OptimizationConfig::default())
            .run_optimization_analysis(&store.path(ArtifactId::FeatureMatrix))
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Optimization(OptimizationError::MissingBenchmark { .. })
        ));
        assert!(!store.path(ArtifactId::MetricsSummary).exists());
        assert!(!store.path(ArtifactId::Recommendations).exists());
    }

    #[test]
    fn test_universe_cap_limits_recommendations() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_matrix(&store, &["BTC", "ETH", "SOL", "ADA"], 20);

        let config = OptimizationConfig {
            risk_aversion: 1.5,
            universe_size_cap: 2,
        };
        let report = OptimizationService::new(store.clone())
            .run_optimization_analysis(&config, &store.path(ArtifactId::FeatureMatrix))
            .unwrap();
        assert!(report.recommendations.len() <= 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_matrix(&store, &["BTC"], 10);

        let config = OptimizationConfig {
            risk_aversion: 0.0,
            universe_size_cap: 8,
        };
        let err = OptimizationRunner::new(config)
            .run_optimization_analysis(&store.path(ArtifactId::FeatureMatrix))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_same_snapshot_same_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_matrix(&store, &["BTC", "ETH", "SOL"], 30);
        let runner = OptimizationRunner::new(OptimizationConfig::default());

        let a = runner
            .run_optimization_analysis(&store.path(ArtifactId::FeatureMatrix))
            .unwrap();
        let b = runner
            .run_optimization_analysis(&store.path(ArtifactId::FeatureMatrix))
            .unwrap();
        assert_eq!(a, b);
    }
}
