//! Pipeline run lifecycle.
//!
//! A run moves strictly forward through the three stages and ends in
//! either `Done` or `Failed`. A failed run is never resumed; the next
//! request starts a new run from Stage 1.

use crate::domain::artifacts::Stage;
use crate::domain::errors::PipelineError;
use crate::domain::optimization_config::OptimizationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    RunningStage1,
    RunningStage2,
    RunningStage3,
    Done,
    Failed,
}

impl RunStatus {
    /// Status while `stage` executes.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Ingestion => RunStatus::RunningStage1,
            Stage::FeatureEngineering => RunStatus::RunningStage2,
            Stage::Optimization => RunStatus::RunningStage3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    fn ordinal(self) -> u8 {
        match self {
            RunStatus::Pending => 0,
            RunStatus::RunningStage1 => 1,
            RunStatus::RunningStage2 => 2,
            RunStatus::RunningStage3 => 3,
            RunStatus::Done => 4,
            RunStatus::Failed => 5,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: RunStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunStatus::Failed => true,
            RunStatus::Pending => false,
            _ => next.ordinal() == self.ordinal() + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: RunStatus,
    pub at: DateTime<Utc>,
}

/// One end-to-end execution of the pipeline for a given config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub config: OptimizationConfig,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transitions: Vec<StatusChange>,
    pub diagnostic: Option<String>,
}

impl PipelineRun {
    pub fn new(config: OptimizationConfig) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            config,
            status: RunStatus::Pending,
            started_at: now,
            finished_at: None,
            transitions: vec![StatusChange {
                status: RunStatus::Pending,
                at: now,
            }],
            diagnostic: None,
        }
    }

    pub fn advance(&mut self, next: RunStatus) -> Result<(), PipelineError> {
        if !self.status.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.transitions.push(StatusChange {
            status: next,
            at: now,
        });
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Moves the run to `Failed` from any non-terminal state.
    pub fn fail(&mut self, diagnostic: impl Into<String>) -> Result<(), PipelineError> {
        self.advance(RunStatus::Failed)?;
        self.diagnostic = Some(diagnostic.into());
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn visited(&self) -> Vec<RunStatus> {
        self.transitions.iter().map(|t| t.status).collect()
    }
}
