//! Worker isolation for pipeline runs.
//!
//! A run executes inside a worker launched through `WorkerLauncher`. The
//! worker reports progress and its final outcome over a completion channel;
//! a channel that closes without `Finished` means the worker crashed.

mod process_worker;
mod thread_worker;

pub use process_worker::{ProcessWorker, serve_stdio};
pub use thread_worker::{StageFactory, ThreadWorker};

use crate::config::ProviderEnvConfig;
use crate::domain::artifacts::Stage;
use crate::domain::errors::PipelineError;
use crate::domain::ingestion::IngestionRequest;
use crate::domain::optimization_config::OptimizationConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Progress and completion messages sent by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
    },
    Finished {
        success: bool,
        diagnostic: Option<String>,
    },
}

impl WorkerEvent {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        WorkerEvent::Finished {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Everything a worker needs to execute one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    pub run_id: Uuid,
    pub config: OptimizationConfig,
    pub ingestion: IngestionRequest,
    pub providers: ProviderEnvConfig,
}

/// Receiving end of a launched worker's completion channel.
pub struct WorkerHandle {
    pub events: UnboundedReceiver<WorkerEvent>,
}

pub trait WorkerLauncher: Send + Sync {
    /// Starts `job` in a fresh worker and returns immediately.
    fn launch(&self, job: RunJob) -> Result<WorkerHandle, PipelineError>;
}

/// Where a running pipeline reports its events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WorkerEvent);
}

impl EventSink for UnboundedSender<WorkerEvent> {
    fn emit(&self, event: WorkerEvent) {
        // The orchestrator may have gone away; the run still completes
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let started = WorkerEvent::StageStarted {
            stage: Stage::FeatureEngineering,
        };
        assert_eq!(
            serde_json::to_string(&started).unwrap(),
            r#"{"event":"stage_started","stage":"feature_engineering"}"#
        );

        let finished: WorkerEvent =
            serde_json::from_str(r#"{"event":"finished","success":false,"diagnostic":"boom"}"#)
                .unwrap();
        assert_eq!(finished, WorkerEvent::failed("boom"));
    }

    #[test]
    fn test_job_round_trips_as_json() {
        let job = RunJob {
            run_id: Uuid::new_v4(),
            config: OptimizationConfig::default(),
            ingestion: IngestionRequest::default(),
            providers: ProviderEnvConfig::default(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(serde_json::from_str::<RunJob>(&json).unwrap(), job);
    }
}
