use crate::domain::run::RunStatus;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Broad failure categories surfaced in logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ingestion,
    IntermediateArtifact,
    Optimization,
    Contention,
    Configuration,
    Worker,
}

/// Errors raised while reading or writing artifacts in the store
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact '{name}' is missing at {path:?}")]
    Missing { name: &'static str, path: PathBuf },

    #[error("Artifact '{name}' at {path:?} is empty")]
    Empty { name: &'static str, path: PathBuf },

    #[error("Artifact '{name}' has header [{found}], expected [{expected}]")]
    SchemaMismatch {
        name: &'static str,
        expected: String,
        found: String,
    },

    #[error("Artifact '{name}' is malformed: {reason}")]
    Malformed { name: &'static str, reason: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{name}': {source}")]
    Csv {
        name: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// Errors raised by the portfolio optimization stage
#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error("Benchmark asset {asset} is absent from the feature matrix")]
    MissingBenchmark { asset: String },

    #[error("Not enough history to backtest: {points} usable points, need at least {required}")]
    InsufficientHistory { points: usize, required: usize },

    #[error("No feasible allocation on {date}: {reason}")]
    Infeasible { date: String, reason: String },

    #[error("Allocation on {date} is not a valid portfolio: weights sum to {sum:.6}")]
    InvalidAllocation { date: String, sum: f64 },
}

/// Top-level pipeline error.
///
/// Every stage failure is fatal to the run; callers only ever see the
/// rendered message as an opaque diagnostic.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Ingestion failed: {reason}")]
    Ingestion { reason: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Feature engineering failed: {reason}")]
    FeatureEngineering { reason: String },

    #[error("Optimization failed: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("Pipeline run {active_run_id} is already active")]
    RunActive { active_run_id: Uuid },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Worker failure: {reason}")]
    Worker { reason: String },

    #[error("Invalid run transition {from:?} -> {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}

impl PipelineError {
    pub fn ingestion(err: impl std::fmt::Display) -> Self {
        PipelineError::Ingestion {
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Ingestion { .. } => ErrorKind::Ingestion,
            PipelineError::Artifact(_) | PipelineError::FeatureEngineering { .. } => {
                ErrorKind::IntermediateArtifact
            }
            PipelineError::Optimization(_) => ErrorKind::Optimization,
            PipelineError::RunActive { .. } => ErrorKind::Contention,
            PipelineError::InvalidConfig { .. } => ErrorKind::Configuration,
            PipelineError::Worker { .. } | PipelineError::InvalidTransition { .. } => {
                ErrorKind::Worker
            }
        }
    }
}
