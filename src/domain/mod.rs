// Artifact registry: logical names, paths and schemas
pub mod artifacts;

// Domain-specific error types
pub mod errors;

// Stage 1 request parameters
pub mod ingestion;

// Optimization parameter bundle
pub mod optimization_config;

// Performance statistics
pub mod performance;

// Port interfaces
pub mod ports;

// Stage 3 output rows
pub mod report;

// Pipeline run lifecycle
pub mod run;

// Raw and engineered data rows
pub mod types;
