//! Stage 1 parameters from environment variables.

use crate::domain::ingestion::{IngestionRequest, Mode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionEnvConfig {
    pub mode: Mode,
    pub base_dir: PathBuf,
    pub pages: Vec<u32>,
    pub top_limit: usize,
    pub history_limit: usize,
    pub currency: String,
}

impl Default for IngestionEnvConfig {
    fn default() -> Self {
        let request = IngestionRequest::default();
        Self {
            mode: request.mode,
            base_dir: request.base_dir,
            pages: request.pages,
            top_limit: request.top_limit,
            history_limit: request.history_limit,
            currency: request.currency,
        }
    }
}

/// Parses a comma-separated page list such as `1,2,3`.
pub fn parse_pages(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("Invalid page index '{}'", part))
        })
        .collect()
}

impl IngestionEnvConfig {
    pub(crate) fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let mode = match var("QUANTEYE_MODE") {
            Some(raw) => Mode::from_str(&raw)?,
            None => defaults.mode,
        };
        let pages = match var("QUANTEYE_PAGES") {
            Some(raw) => parse_pages(&raw).context("Failed to parse QUANTEYE_PAGES")?,
            None => defaults.pages,
        };

        Ok(Self {
            mode,
            base_dir: var("QUANTEYE_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.base_dir),
            pages,
            top_limit: var("QUANTEYE_TOP_LIMIT")
                .unwrap_or_else(|| defaults.top_limit.to_string())
                .parse::<usize>()
                .context("Failed to parse QUANTEYE_TOP_LIMIT")?,
            history_limit: var("QUANTEYE_HISTORY_LIMIT")
                .unwrap_or_else(|| defaults.history_limit.to_string())
                .parse::<usize>()
                .context("Failed to parse QUANTEYE_HISTORY_LIMIT")?,
            currency: var("QUANTEYE_CURRENCY").unwrap_or(defaults.currency),
        })
    }

    pub fn request(&self) -> IngestionRequest {
        IngestionRequest {
            mode: self.mode,
            base_dir: self.base_dir.clone(),
            pages: self.pages.clone(),
            top_limit: self.top_limit,
            history_limit: self.history_limit,
            currency: self.currency.clone(),
        }
    }
}
