//! Single-slot pipeline orchestration.
//!
//! At most one run is active at a time. The orchestrator owns the
//! `PipelineRun` record, advances it from worker events and reports one of
//! three outcomes to the caller.

use crate::application::worker::{
    ProcessWorker, RunJob, ThreadWorker, WorkerEvent, WorkerLauncher,
};
use crate::config::{AppConfig, ContentionPolicy, ProviderEnvConfig, WorkerKind};
use crate::domain::artifacts::REGISTRY;
use crate::domain::errors::PipelineError;
use crate::domain::ingestion::IngestionRequest;
use crate::domain::optimization_config::ConfigOverrides;
use crate::domain::run::{PipelineRun, RunStatus};
use crate::infrastructure::artifact_store::ArtifactStore;
use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What the caller of `start_pipeline` gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        run_id: Uuid,
    },
    Failure {
        run_id: Option<Uuid>,
        diagnostic: String,
    },
    Busy {
        active_run_id: Option<Uuid>,
    },
}

impl PipelineOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            PipelineOutcome::Success { .. } => "success",
            PipelineOutcome::Failure { .. } => "failure",
            PipelineOutcome::Busy { .. } => "busy",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }
}

#[derive(Default)]
struct RunRegistry {
    current: Option<PipelineRun>,
    last: Option<PipelineRun>,
}

struct Inner {
    launcher: Arc<dyn WorkerLauncher>,
    ingestion: IngestionRequest,
    providers: ProviderEnvConfig,
    policy: ContentionPolicy,
    slot: Arc<tokio::sync::Mutex<()>>,
    registry: Mutex<RunRegistry>,
}

#[derive(Clone)]
pub struct PipelineOrchestrator {
    inner: Arc<Inner>,
}

impl PipelineOrchestrator {
    pub fn new(
        launcher: Arc<dyn WorkerLauncher>,
        ingestion: IngestionRequest,
        providers: ProviderEnvConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                ingestion,
                providers,
                policy: ContentionPolicy::default(),
                slot: Arc::new(tokio::sync::Mutex::new(())),
                registry: Mutex::new(RunRegistry::default()),
            }),
        }
    }

    /// Sets the contention policy. Must be called before the orchestrator is cloned.
    pub fn with_policy(self, policy: ContentionPolicy) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.policy = policy;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                warn!("Contention policy ignored: orchestrator is already shared");
                Self { inner }
            }
        }
    }

    /// Orchestrator wired according to `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let launcher: Arc<dyn WorkerLauncher> = match config.worker.kind {
            WorkerKind::Thread => Arc::new(ThreadWorker::new()),
            WorkerKind::Process => {
                let timeout = config.worker.timeout_secs.map(Duration::from_secs);
                match &config.worker.executable {
                    Some(exe) => Arc::new(ProcessWorker::new(exe, timeout)),
                    None => Arc::new(ProcessWorker::current_exe(timeout)?),
                }
            }
        };

        Ok(Self::new(
            launcher,
            config.ingestion.request(),
            config.providers.clone(),
        )
        .with_policy(config.worker.contention))
    }

    pub fn policy(&self) -> ContentionPolicy {
        self.inner.policy
    }

    /// Whether a run holds the slot. Stays true after the run record has
    /// failed until its worker has actually finished.
    pub fn is_run_active(&self) -> bool {
        self.inner.slot.try_lock().is_err()
    }

    /// Snapshot of the active run, if any.
    pub fn current_run(&self) -> Option<PipelineRun> {
        self.inner.registry().current.clone()
    }

    /// Snapshot of the most recently finished run.
    pub fn last_run(&self) -> Option<PipelineRun> {
        self.inner.registry().last.clone()
    }

    /// Runs the full pipeline for `overrides` and waits for its outcome.
    ///
    /// The run holds the slot until it finishes, even if the returned
    /// future is dropped.
    pub async fn start_pipeline(&self, overrides: ConfigOverrides) -> PipelineOutcome {
        let config = match overrides.apply() {
            Ok(config) => config,
            Err(e) => {
                warn!("Rejected pipeline trigger: {}", e);
                return PipelineOutcome::Failure {
                    run_id: None,
                    diagnostic: e.to_string(),
                };
            }
        };

        let permit = match self.inner.policy {
            ContentionPolicy::Reject => match self.inner.slot.clone().try_lock_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    let active_run_id = self.current_run().map(|run| run.run_id);
                    let err = PipelineError::RunActive {
                        active_run_id: active_run_id.unwrap_or_default(),
                    };
                    warn!("{}; rejecting trigger", err);
                    return PipelineOutcome::Busy { active_run_id };
                }
            },
            ContentionPolicy::Queue => {
                if self.is_run_active() {
                    info!("Pipeline busy; queueing trigger");
                }
                self.inner.slot.clone().lock_owned().await
            }
        };

        let run = PipelineRun::new(config);
        let run_id = run.run_id;
        let job = RunJob {
            run_id,
            config: run.config.clone(),
            ingestion: self.inner.ingestion.clone(),
            providers: self.inner.providers.clone(),
        };
        self.inner.registry().current = Some(run);
        info!("Run {} accepted", run_id);

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            inner.drive(job).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Run {} supervision task failed: {}", run_id, e);
                PipelineOutcome::Failure {
                    run_id: Some(run_id),
                    diagnostic: format!("orchestrator task failed: {}", e),
                }
            }
        }
    }
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, RunRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies `f` to the current run; transition errors fail the run.
    fn update_run(&self, f: impl FnOnce(&mut PipelineRun) -> Result<(), PipelineError>) {
        let mut registry = self.registry();
        if let Some(run) = registry.current.as_mut()
            && let Err(e) = f(run)
        {
            error!("Run {}: {}", run.run_id, e);
            if run.is_active() {
                let _ = run.fail(e.to_string());
            }
        }
    }

    /// Every registered artifact must be present after a successful run.
    fn verify_store(&self) -> Result<(), PipelineError> {
        let store = ArtifactStore::new(&self.ingestion.base_dir);
        for spec in REGISTRY.iter() {
            store.check(spec.id)?;
        }
        Ok(())
    }

    async fn drive(&self, job: RunJob) -> PipelineOutcome {
        let run_id = job.run_id;

        match self.launcher.launch(job) {
            Ok(mut handle) => {
                let mut finished = false;
                while let Some(event) = handle.events.recv().await {
                    debug!("Run {} event: {:?}", run_id, event);
                    match event {
                        WorkerEvent::StageStarted { stage } => {
                            self.update_run(|run| run.advance(RunStatus::running(stage)));
                        }
                        WorkerEvent::StageCompleted { stage } => {
                            info!("Run {}: {} completed", run_id, stage);
                        }
                        WorkerEvent::Finished {
                            success: true, ..
                        } => {
                            let verified = self.verify_store();
                            self.update_run(|run| match verified {
                                Ok(()) => run.advance(RunStatus::Done),
                                Err(e) => run.fail(format!("artifact check failed: {}", e)),
                            });
                            finished = true;
                            break;
                        }
                        WorkerEvent::Finished {
                            success: false,
                            diagnostic,
                        } => {
                            let diagnostic =
                                diagnostic.unwrap_or_else(|| "worker reported failure".to_string());
                            self.update_run(|run| run.fail(diagnostic));
                            finished = true;
                            break;
                        }
                    }
                }

                if !finished {
                    self.update_run(|run| run.fail("worker exited without reporting completion"));
                }
            }
            Err(e) => {
                error!("Run {} could not start: {}", run_id, e);
                self.update_run(|run| run.fail(e.to_string()));
            }
        }

        self.finish(run_id)
    }

    /// Moves the current run to `last` and shapes the outcome.
    fn finish(&self, run_id: Uuid) -> PipelineOutcome {
        let mut registry = self.registry();
        let Some(run) = registry.current.take() else {
            return PipelineOutcome::Failure {
                run_id: Some(run_id),
                diagnostic: "run record lost".to_string(),
            };
        };

        let outcome = match run.status {
            RunStatus::Done => {
                info!("Run {} done", run_id);
                PipelineOutcome::Success { run_id }
            }
            status => {
                let diagnostic = run
                    .diagnostic
                    .clone()
                    .unwrap_or_else(|| format!("run ended in state {:?}", status));
                warn!("Run {} failed: {}", run_id, diagnostic);
                PipelineOutcome::Failure {
                    run_id: Some(run_id),
                    diagnostic,
                }
            }
        };
        registry.last = Some(run);
        outcome
    }
}
