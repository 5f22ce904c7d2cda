// Pipeline stages
pub mod features;
pub mod ingestion;
pub mod optimization;

// Stage sequencing and worker isolation
pub mod pipeline;
pub mod worker;

// Single-run orchestration
pub mod orchestrator;

pub use orchestrator::{PipelineOrchestrator, PipelineOutcome};
