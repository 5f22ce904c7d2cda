mod common;

use common::{gated_stages, mock_orchestrator, orchestrator_with, snapshot};
use quanteye::application::PipelineOutcome;
use quanteye::application::worker::ThreadWorker;
use quanteye::config::ContentionPolicy;
use quanteye::domain::optimization_config::ConfigOverrides;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

#[tokio::test]
async fn test_second_trigger_is_rejected_while_running() {
    let dir = tempfile::tempdir().unwrap();

    // Seed the store so there is something a stray run could clobber
    assert!(mock_orchestrator(dir.path())
        .start_pipeline(ConfigOverrides::default())
        .await
        .is_success());
    let before = snapshot(dir.path());

    let gate = Arc::new(Semaphore::new(0));
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let worker = ThreadWorker::with_stages(gated_stages(gate.clone(), entered_tx));
    let orchestrator = orchestrator_with(Arc::new(worker), dir.path());
    assert_eq!(orchestrator.policy(), ContentionPolicy::Reject);

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_pipeline(ConfigOverrides::default()).await })
    };
    entered.recv().await.unwrap();

    let active = orchestrator.current_run().unwrap();
    assert!(active.is_active());
    assert!(orchestrator.is_run_active());

    let second = orchestrator
        .start_pipeline(ConfigOverrides::new(3.0, 3))
        .await;
    assert_eq!(
        second,
        PipelineOutcome::Busy {
            active_run_id: Some(active.run_id)
        }
    );
    assert_eq!(snapshot(dir.path()), before);
    assert_eq!(orchestrator.current_run().unwrap().run_id, active.run_id);

    gate.add_permits(1);
    let outcome = first.await.unwrap();
    assert_eq!(outcome, PipelineOutcome::Success { run_id: active.run_id });
    assert!(!orchestrator.is_run_active());
    // The rejected trigger never ran
    assert_eq!(orchestrator.last_run().unwrap().run_id, active.run_id);
}

#[tokio::test]
async fn test_queue_policy_runs_triggers_one_after_another() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let worker = ThreadWorker::with_stages(gated_stages(gate.clone(), entered_tx));
    let orchestrator = orchestrator_with(Arc::new(worker), dir.path())
        .with_policy(ContentionPolicy::Queue);

    let trigger = |overrides: ConfigOverrides| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_pipeline(overrides).await })
    };

    let first = trigger(ConfigOverrides::new(1.5, 8));
    entered.recv().await.unwrap();
    let first_id = orchestrator.current_run().unwrap().run_id;

    let second = trigger(ConfigOverrides::new(1.5, 4));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second.is_finished());
    assert_eq!(orchestrator.current_run().unwrap().run_id, first_id);

    gate.add_permits(1);
    assert_eq!(
        first.await.unwrap(),
        PipelineOutcome::Success { run_id: first_id }
    );

    entered.recv().await.unwrap();
    let second_run = orchestrator.current_run().unwrap();
    assert_ne!(second_run.run_id, first_id);
    assert_eq!(second_run.config.universe_size_cap, 4);

    gate.add_permits(1);
    assert_eq!(
        second.await.unwrap(),
        PipelineOutcome::Success {
            run_id: second_run.run_id
        }
    );
}
