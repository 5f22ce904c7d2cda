//! Stage 1: raw market and news ingestion.

mod service;

pub use service::{HISTORY_CONCURRENCY, IngestionService};
