//! Child-process isolation.
//!
//! The parent spawns `<exe> worker`, writes the job as JSON to the child's
//! stdin and reads one JSON `WorkerEvent` per line from its stdout. Logs go
//! to stderr, so stdout carries nothing but events.

use crate::application::pipeline::{PipelineRunner, StageSet};
use crate::application::worker::{EventSink, RunJob, WorkerEvent, WorkerHandle, WorkerLauncher};
use crate::domain::errors::PipelineError;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};

pub struct ProcessWorker {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessWorker {
    pub fn new(executable: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Worker that re-executes the running binary.
    pub fn current_exe(timeout: Option<Duration>) -> Result<Self> {
        let executable = std::env::current_exe().context("Failed to locate current executable")?;
        Ok(Self::new(executable, timeout))
    }
}

/// Forwards events from the child's stdout; returns whether `Finished` was seen.
async fn forward_events(stdout: ChildStdout, tx: &UnboundedSender<WorkerEvent>) -> bool {
    let mut lines = BufReader::new(stdout).lines();
    let mut finished = false;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<WorkerEvent>(line) {
                    Ok(event) => {
                        finished |= matches!(event, WorkerEvent::Finished { .. });
                        tx.emit(event);
                    }
                    Err(e) => warn!("Ignoring non-event worker output '{}': {}", line, e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read worker output: {}", e);
                break;
            }
        }
    }
    finished
}

async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    tx: UnboundedSender<WorkerEvent>,
    timeout: Option<Duration>,
) {
    let finished = match timeout {
        Some(limit) => match tokio::time::timeout(limit, forward_events(stdout, &tx)).await {
            Ok(finished) => finished,
            Err(_) => {
                error!("Worker exceeded {:?}, killing it", limit);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill worker: {}", e);
                }
                tx.emit(WorkerEvent::failed(format!(
                    "worker timed out after {}s",
                    limit.as_secs()
                )));
                return;
            }
        },
        None => forward_events(stdout, &tx).await,
    };

    match child.wait().await {
        Ok(status) if !finished => {
            tx.emit(WorkerEvent::failed(format!(
                "worker exited ({}) without reporting completion",
                status
            )));
        }
        Ok(status) => debug!("Worker exited with {}", status),
        Err(e) => {
            if !finished {
                tx.emit(WorkerEvent::failed(format!("failed to wait for worker: {}", e)));
            }
        }
    }
}

impl WorkerLauncher for ProcessWorker {
    fn launch(&self, job: RunJob) -> Result<WorkerHandle, PipelineError> {
        let worker_err = |reason: String| PipelineError::Worker { reason };

        let payload = serde_json::to_vec(&job)
            .map_err(|e| worker_err(format!("failed to encode job: {}", e)))?;

        let mut child = Command::new(&self.executable)
            .arg("worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                worker_err(format!(
                    "failed to spawn {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| worker_err("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| worker_err("worker stdout unavailable".to_string()))?;

        info!(
            "Run {} launched in worker process {:?}",
            job.run_id,
            child.id()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let timeout = self.timeout;
        tokio::spawn(async move {
            // Dropping stdin closes it, which ends the child's job read
            if let Err(e) = stdin.write_all(&payload).await {
                warn!("Failed to send job to worker: {}", e);
            }
            drop(stdin);
            supervise(child, stdout, tx, timeout).await;
        });

        Ok(WorkerHandle { events: rx })
    }
}

/// Writes each event as one JSON line on stdout.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: WorkerEvent) {
        let mut out = std::io::stdout().lock();
        match serde_json::to_string(&event) {
            Ok(line) => {
                if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
                    error!("Parent closed the event channel");
                }
            }
            Err(e) => error!("Failed to encode worker event: {}", e),
        }
    }
}

/// Body of the `worker` subcommand: reads a job from stdin, runs it and
/// reports events on stdout. Returns whether the run succeeded.
pub async fn serve_stdio() -> Result<bool> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read job from stdin")?;
    let job: RunJob = serde_json::from_str(&input).context("Failed to parse job")?;
    info!("Worker process running job {}", job.run_id);

    let sink = StdoutSink;
    match StageSet::for_job(&job) {
        Ok(stages) => Ok(PipelineRunner::new(stages).run_and_report(&job, &sink).await),
        Err(e) => {
            sink.emit(WorkerEvent::failed(format!("{:#}", e)));
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEnvConfig;
    use crate::domain::ingestion::IngestionRequest;
    use crate::domain::optimization_config::OptimizationConfig;
    use uuid::Uuid;

    fn job() -> RunJob {
        RunJob {
            run_id: Uuid::new_v4(),
            config: OptimizationConfig::default(),
            ingestion: IngestionRequest::default(),
            providers: ProviderEnvConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_worker_error() {
        let worker = ProcessWorker::new("/nonexistent/quanteye", None);
        let err = worker.launch(job()).err().unwrap();
        assert!(matches!(err, PipelineError::Worker { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_without_events_is_reported_as_crash() {
        // `true` ignores its arguments and exits without output
        let worker = ProcessWorker::new("true", None);
        let mut handle = worker.launch(job()).unwrap();

        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            WorkerEvent::Finished { success: false, diagnostic: Some(d) } if d.contains("without reporting")
        ));
    }
}
