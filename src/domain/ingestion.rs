use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Where Stage 1 sources its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Live crypto market and news providers
    Crypto,
    /// Deterministic synthetic data, no network access
    Mock,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(Mode::Crypto),
            "mock" => Ok(Mode::Mock),
            _ => anyhow::bail!("Invalid MODE: {}. Must be 'crypto' or 'mock'", s),
        }
    }
}

/// Parameters of one Stage 1 ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub mode: Mode,
    pub base_dir: PathBuf,
    /// 1-based page indices, fetched in order
    pub pages: Vec<u32>,
    pub top_limit: usize,
    pub history_limit: usize,
    pub currency: String,
}

impl Default for IngestionRequest {
    fn default() -> Self {
        Self {
            mode: Mode::Crypto,
            base_dir: PathBuf::from("./results"),
            pages: vec![1, 2],
            top_limit: 100,
            history_limit: 600,
            currency: "USD".to_string(),
        }
    }
}

impl IngestionRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason: &str| PipelineError::InvalidConfig {
            reason: reason.to_string(),
        };

        if self.pages.is_empty() {
            return Err(invalid("pages must not be empty"));
        }
        if self.pages.contains(&0) {
            return Err(invalid("page indices are 1-based"));
        }
        if self.top_limit == 0 {
            return Err(invalid("top_limit must be at least 1"));
        }
        if self.history_limit == 0 {
            return Err(invalid("history_limit must be at least 1"));
        }
        if self.currency.trim().is_empty() {
            return Err(invalid("currency must not be empty"));
        }
        Ok(())
    }
}
