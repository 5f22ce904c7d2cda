#![allow(dead_code)]

use async_trait::async_trait;
use quanteye::application::PipelineOrchestrator;
use quanteye::application::pipeline::StageSet;
use quanteye::application::worker::{RunJob, StageFactory, ThreadWorker, WorkerLauncher};
use quanteye::config::ProviderEnvConfig;
use quanteye::domain::artifacts::REGISTRY;
use quanteye::domain::errors::PipelineError;
use quanteye::domain::ingestion::{IngestionRequest, Mode};
use quanteye::domain::ports::IngestionStage;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

pub fn mock_request(base_dir: &Path) -> IngestionRequest {
    IngestionRequest {
        mode: Mode::Mock,
        base_dir: base_dir.to_path_buf(),
        pages: vec![1],
        top_limit: 8,
        history_limit: 150,
        currency: "USD".to_string(),
    }
}

pub fn orchestrator_with(launcher: Arc<dyn WorkerLauncher>, base_dir: &Path) -> PipelineOrchestrator {
    PipelineOrchestrator::new(launcher, mock_request(base_dir), ProviderEnvConfig::default())
}

pub fn mock_orchestrator(base_dir: &Path) -> PipelineOrchestrator {
    orchestrator_with(Arc::new(ThreadWorker::new()), base_dir)
}

/// Raw bytes of every registered artifact, `None` where absent.
pub fn snapshot(base_dir: &Path) -> Vec<Option<Vec<u8>>> {
    REGISTRY
        .iter()
        .map(|spec| std::fs::read(base_dir.join(spec.relative_path)).ok())
        .collect()
}

/// Ingestion that blocks until the test releases it.
///
/// Each entry is announced on `entered`; each `gate` permit lets one run through.
pub struct GatedIngestion {
    pub inner: Arc<dyn IngestionStage>,
    pub gate: Arc<Semaphore>,
    pub entered: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl IngestionStage for GatedIngestion {
    async fn ingest(&self, request: &IngestionRequest) -> Result<(), PipelineError> {
        let _ = self.entered.send(());
        self.gate
            .acquire()
            .await
            .map_err(PipelineError::ingestion)?
            .forget();
        self.inner.ingest(request).await
    }
}

pub fn gated_stages(gate: Arc<Semaphore>, entered: mpsc::UnboundedSender<()>) -> StageFactory {
    Arc::new(move |job: &RunJob| -> anyhow::Result<StageSet> {
        let mut stages = StageSet::for_job(job)?;
        stages.ingestion = Arc::new(GatedIngestion {
            inner: stages.ingestion,
            gate: gate.clone(),
            entered: entered.clone(),
        });
        Ok(stages)
    })
}
