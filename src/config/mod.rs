//! Configuration module for QuantEye.
//!
//! Configuration is loaded from environment variables (after `.env` has been
//! read by the binary) or from a TOML file with the same structure, and is
//! organized by concern: Ingestion, Providers and Worker.

mod ingestion_config;
mod provider_config;
mod worker_config;

pub use ingestion_config::{IngestionEnvConfig, parse_pages};
pub use provider_config::{DEFAULT_RSS_URL, NewsSource, ProviderEnvConfig};
pub use worker_config::{ContentionPolicy, WorkerEnvConfig, WorkerKind};

pub use crate::domain::ingestion::Mode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingestion: IngestionEnvConfig,
    pub providers: ProviderEnvConfig,
    pub worker: WorkerEnvConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&|key| env::var(key).ok())
    }

    pub(crate) fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ingestion =
            IngestionEnvConfig::from_vars(var).context("Failed to load ingestion config")?;
        let providers =
            ProviderEnvConfig::from_vars(var).context("Failed to load provider config")?;
        let worker = WorkerEnvConfig::from_vars(var).context("Failed to load worker config")?;

        Ok(Self {
            ingestion,
            providers,
            worker,
        })
    }

    /// Loads configuration from a TOML file. Missing sections take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config TOML: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn test_from_vars_composes_sections() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("QUANTEYE_MODE", "mock"),
            ("QUANTEYE_BASE_DIR", "/tmp/quanteye"),
            ("QUANTEYE_PAGES", "1"),
            ("QUANTEYE_NEWS_SOURCE", "rss"),
            ("QUANTEYE_WORKER", "process"),
        ]);
        let config = AppConfig::from_vars(&|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.ingestion.mode, Mode::Mock);
        assert_eq!(config.ingestion.base_dir, PathBuf::from("/tmp/quanteye"));
        assert_eq!(config.ingestion.pages, vec![1]);
        assert_eq!(config.providers.news_source, NewsSource::Rss);
        assert_eq!(config.worker.kind, WorkerKind::Process);
    }

    #[test]
    fn test_invalid_mode_fails() {
        let result = AppConfig::from_vars(&|key| (key == "QUANTEYE_MODE").then(|| "forex".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [ingestion]
            mode = "mock"
            pages = [1, 2, 3]

            [worker]
            contention = "queue"
            timeout_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.ingestion.mode, Mode::Mock);
        assert_eq!(config.ingestion.pages, vec![1, 2, 3]);
        assert_eq!(config.ingestion.currency, "USD");
        assert_eq!(config.worker.contention, ContentionPolicy::Queue);
        assert_eq!(config.worker.timeout_secs, Some(120));
        assert_eq!(config.providers, ProviderEnvConfig::default());
    }

    #[test]
    fn test_missing_toml_file() {
        assert!(AppConfig::from_toml_file("/definitely/not/here.toml").is_err());
    }
}
