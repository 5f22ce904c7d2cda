//! Strict Stage 1 -> 2 -> 3 execution with artifact contract checks.

use crate::application::features::FeatureEngineeringService;
use crate::application::ingestion::IngestionService;
use crate::application::optimization::OptimizationService;
use crate::application::worker::{EventSink, RunJob, WorkerEvent};
use crate::config::{NewsSource, ProviderEnvConfig};
use crate::domain::artifacts::{ArtifactId, Stage};
use crate::domain::errors::PipelineError;
use crate::domain::ingestion::{IngestionRequest, Mode};
use crate::domain::ports::{
    FeatureStage, IngestionStage, MarketDataProvider, NewsProvider, OptimizationStage,
};
use crate::domain::report::OptimizationReport;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::cryptocompare::{CryptoCompareMarketData, CryptoCompareNews};
use crate::infrastructure::http_client_factory::HttpClientFactory;
use crate::infrastructure::mock::{MockMarketData, MockNews};
use crate::infrastructure::news::RssNewsService;
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// The three stage implementations of one run.
#[derive(Clone)]
pub struct StageSet {
    pub ingestion: Arc<dyn IngestionStage>,
    pub features: Arc<dyn FeatureStage>,
    pub optimization: Arc<dyn OptimizationStage>,
}

impl StageSet {
    /// Production stages for `request.mode`.
    pub fn for_request(request: &IngestionRequest, providers: &ProviderEnvConfig) -> Result<Self> {
        let (market, news): (Arc<dyn MarketDataProvider>, Arc<dyn NewsProvider>) =
            match request.mode {
                Mode::Mock => (Arc::new(MockMarketData::new()), Arc::new(MockNews::new())),
                Mode::Crypto => {
                    let client = match &providers.cryptocompare_api_key {
                        Some(key) => HttpClientFactory::create_authorized_client(
                            providers.http_timeout_secs,
                            key,
                        )?,
                        None => HttpClientFactory::create_client(providers.http_timeout_secs),
                    };
                    let market = Arc::new(CryptoCompareMarketData::new(
                        client.clone(),
                        providers.cryptocompare_base_url.clone(),
                    ));
                    let news: Arc<dyn NewsProvider> = match providers.news_source {
                        NewsSource::CryptoCompare => Arc::new(CryptoCompareNews::new(
                            client,
                            providers.cryptocompare_base_url.clone(),
                        )),
                        NewsSource::Rss => Arc::new(RssNewsService::new(&providers.rss_url, client)),
                    };
                    (market, news)
                }
            };

        Ok(Self {
            ingestion: Arc::new(IngestionService::new(market, news)),
            features: Arc::new(
                FeatureEngineeringService::new().with_store(ArtifactStore::new(&request.base_dir)),
            ),
            optimization: Arc::new(OptimizationService::new(ArtifactStore::new(
                &request.base_dir,
            ))),
        })
    }

    pub fn for_job(job: &RunJob) -> Result<Self> {
        Self::for_request(&job.ingestion, &job.providers)
    }
}

pub struct PipelineRunner {
    stages: StageSet,
}

impl PipelineRunner {
    pub fn new(stages: StageSet) -> Self {
        Self { stages }
    }

    /// Runs the stages in order, stopping at the first failure.
    ///
    /// A stage is only reported as started once its declared inputs are
    /// present; after it returns its declared outputs must be present.
    pub async fn run(
        &self,
        job: &RunJob,
        sink: &dyn EventSink,
    ) -> Result<OptimizationReport, PipelineError> {
        let store = ArtifactStore::new(&job.ingestion.base_dir);
        let mut report = None;

        for stage in Stage::ALL {
            store.require_inputs(stage)?;
            sink.emit(WorkerEvent::StageStarted { stage });
            info!("Run {}: starting {}", job.run_id, stage);

            match stage {
                Stage::Ingestion => self.stages.ingestion.ingest(&job.ingestion).await?,
                Stage::FeatureEngineering => self.stages.features.build_features(
                    &store.path(ArtifactId::MarketRaw),
                    &store.path(ArtifactId::NewsRaw),
                    &store.dir_of(ArtifactId::FeatureMatrix),
                )?,
                Stage::Optimization => {
                    report = Some(self.stages.optimization.run_optimization_analysis(
                        &job.config,
                        &store.path(ArtifactId::FeatureMatrix),
                    )?);
                }
            }

            store.verify_outputs(stage)?;
            sink.emit(WorkerEvent::StageCompleted { stage });
        }

        report.ok_or_else(|| PipelineError::Worker {
            reason: "optimization stage produced no report".to_string(),
        })
    }

    /// Runs the pipeline and always finishes with a `Finished` event.
    pub async fn run_and_report(&self, job: &RunJob, sink: &dyn EventSink) -> bool {
        match self.run(job, sink).await {
            Ok(report) => {
                info!(
                    "Run {} finished: {} recommendations",
                    job.run_id,
                    report.recommendations.len()
                );
                sink.emit(WorkerEvent::Finished {
                    success: true,
                    diagnostic: None,
                });
                true
            }
            Err(e) => {
                error!("Run {} failed ({:?}): {}", job.run_id, e.kind(), e);
                sink.emit(WorkerEvent::failed(e.to_string()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization_config::OptimizationConfig;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<WorkerEvent>>);

    impl EventSink for Recorder {
        fn emit(&self, event: WorkerEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn mock_job(base_dir: &std::path::Path) -> RunJob {
        RunJob {
            run_id: Uuid::new_v4(),
            config: OptimizationConfig::default(),
            ingestion: IngestionRequest {
                mode: Mode::Mock,
                base_dir: base_dir.to_path_buf(),
                pages: vec![1],
                top_limit: 6,
                history_limit: 120,
                currency: "USD".to_string(),
            },
            providers: ProviderEnvConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_mock_run_emits_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let job = mock_job(dir.path());
        let runner = PipelineRunner::new(StageSet::for_job(&job).unwrap());
        let recorder = Recorder::default();

        assert!(runner.run_and_report(&job, &recorder).await);

        let events = recorder.0.into_inner().unwrap();
        let mut expected = Vec::new();
        for stage in Stage::ALL {
            expected.push(WorkerEvent::StageStarted { stage });
            expected.push(WorkerEvent::StageCompleted { stage });
        }
        expected.push(WorkerEvent::Finished {
            success: true,
            diagnostic: None,
        });
        assert_eq!(events, expected);
    }

    /// Deletes an artifact as soon as `stage` reports completion.
    struct DeletesAfter {
        stage: Stage,
        victim: std::path::PathBuf,
        events: Recorder,
    }

    impl EventSink for DeletesAfter {
        fn emit(&self, event: WorkerEvent) {
            if event == (WorkerEvent::StageCompleted { stage: self.stage }) {
                std::fs::remove_file(&self.victim).unwrap();
            }
            self.events.emit(event);
        }
    }

    #[tokio::test]
    async fn test_stage_with_missing_input_is_never_started() {
        let dir = tempfile::tempdir().unwrap();
        let job = mock_job(dir.path());
        let runner = PipelineRunner::new(StageSet::for_job(&job).unwrap());
        let sink = DeletesAfter {
            stage: Stage::FeatureEngineering,
            victim: ArtifactStore::new(dir.path()).path(ArtifactId::FeatureMatrix),
            events: Recorder::default(),
        };

        let err = runner.run(&job, &sink).await.unwrap_err();
        assert!(err.to_string().contains("feature_matrix"));

        let events = sink.events.0.into_inner().unwrap();
        assert_eq!(
            events.last(),
            Some(&WorkerEvent::StageCompleted {
                stage: Stage::FeatureEngineering
            })
        );
        assert!(!events.contains(&WorkerEvent::StageStarted {
            stage: Stage::Optimization
        }));
    }

    #[tokio::test]
    async fn test_failure_stops_the_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = mock_job(dir.path());
        // Too short for any feature row
        job.ingestion.history_limit = 10;
        let runner = PipelineRunner::new(StageSet::for_job(&job).unwrap());
        let recorder = Recorder::default();

        assert!(!runner.run_and_report(&job, &recorder).await);

        let events = recorder.0.into_inner().unwrap();
        assert!(!events.contains(&WorkerEvent::StageStarted {
            stage: Stage::Optimization
        }));
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Finished { success: false, diagnostic: Some(_) })
        ));
    }
}
