use crate::application::pipeline::{PipelineRunner, StageSet};
use crate::application::worker::{EventSink, RunJob, WorkerEvent, WorkerHandle, WorkerLauncher};
use crate::domain::errors::PipelineError;
use std::any::Any;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Builds the stages for a job inside the worker thread.
pub type StageFactory = Arc<dyn Fn(&RunJob) -> anyhow::Result<StageSet> + Send + Sync>;

/// Runs each job on a dedicated, named OS thread with its own runtime.
///
/// A supervisor thread joins the worker and turns a panic into a failed
/// `Finished` event, so a crashing stage cannot take the caller down.
pub struct ThreadWorker {
    factory: StageFactory,
}

impl ThreadWorker {
    pub fn new() -> Self {
        Self::with_stages(Arc::new(StageSet::for_job))
    }

    pub fn with_stages(factory: StageFactory) -> Self {
        Self { factory }
    }
}

impl Default for ThreadWorker {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run_job(factory: StageFactory, job: RunJob, sink: mpsc::UnboundedSender<WorkerEvent>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            sink.emit(WorkerEvent::failed(format!("failed to start worker runtime: {}", e)));
            return;
        }
    };

    runtime.block_on(async {
        match factory(&job) {
            Ok(stages) => {
                PipelineRunner::new(stages).run_and_report(&job, &sink).await;
            }
            Err(e) => sink.emit(WorkerEvent::failed(format!("{:#}", e))),
        }
    });
}

impl WorkerLauncher for ThreadWorker {
    fn launch(&self, job: RunJob) -> Result<WorkerHandle, PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let run_id = job.run_id;
        let short_id: String = run_id.simple().to_string().chars().take(8).collect();
        let factory = self.factory.clone();
        let worker_tx = tx.clone();

        let worker = thread::Builder::new()
            .name(format!("quanteye-run-{}", short_id))
            .spawn(move || run_job(factory, job, worker_tx))
            .map_err(|e| PipelineError::Worker {
                reason: format!("failed to spawn worker thread: {}", e),
            })?;
        info!("Run {} launched on thread worker", run_id);

        thread::Builder::new()
            .name(format!("quanteye-sup-{}", short_id))
            .spawn(move || {
                if let Err(payload) = worker.join() {
                    let message = panic_message(payload.as_ref());
                    error!("Run {} worker panicked: {}", run_id, message);
                    tx.emit(WorkerEvent::failed(format!("worker panicked: {}", message)));
                }
            })
            .map_err(|e| PipelineError::Worker {
                reason: format!("failed to spawn supervisor thread: {}", e),
            })?;

        Ok(WorkerHandle { events: rx })
    }
}
