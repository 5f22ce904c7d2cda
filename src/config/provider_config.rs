//! Data provider configuration parsing from environment variables.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_RSS_URL: &str = "https://www.coindesk.com/arc/outboundfeeds/rss/";

/// Where crypto-mode news comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsSource {
    CryptoCompare,
    Rss,
}

impl FromStr for NewsSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cryptocompare" => Ok(NewsSource::CryptoCompare),
            "rss" => Ok(NewsSource::Rss),
            _ => anyhow::bail!(
                "Invalid QUANTEYE_NEWS_SOURCE: {}. Must be 'cryptocompare' or 'rss'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEnvConfig {
    pub cryptocompare_api_key: Option<String>,
    pub cryptocompare_base_url: Option<String>,
    pub news_source: NewsSource,
    pub rss_url: String,
    pub http_timeout_secs: u64,
}

impl Default for ProviderEnvConfig {
    fn default() -> Self {
        Self {
            cryptocompare_api_key: None,
            cryptocompare_base_url: None,
            news_source: NewsSource::CryptoCompare,
            rss_url: DEFAULT_RSS_URL.to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl ProviderEnvConfig {
    pub(crate) fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let news_source = match var("QUANTEYE_NEWS_SOURCE") {
            Some(raw) => NewsSource::from_str(&raw)?,
            None => NewsSource::CryptoCompare,
        };

        Ok(Self {
            cryptocompare_api_key: var("CRYPTOCOMPARE_API_KEY").filter(|key| !key.is_empty()),
            cryptocompare_base_url: var("CRYPTOCOMPARE_BASE_URL").filter(|url| !url.is_empty()),
            news_source,
            rss_url: var("QUANTEYE_RSS_URL").unwrap_or_else(|| DEFAULT_RSS_URL.to_string()),
            http_timeout_secs: var("QUANTEYE_HTTP_TIMEOUT_SECS")
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_source_parsing() {
        assert_eq!(NewsSource::from_str("RSS").unwrap(), NewsSource::Rss);
        assert_eq!(
            NewsSource::from_str("cryptocompare").unwrap(),
            NewsSource::CryptoCompare
        );
        assert!(NewsSource::from_str("twitter").is_err());
    }

    #[test]
    fn test_empty_api_key_is_none() {
        let config = ProviderEnvConfig::from_vars(&|key| match key {
            "CRYPTOCOMPARE_API_KEY" => Some(String::new()),
            "QUANTEYE_HTTP_TIMEOUT_SECS" => Some("oops".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.cryptocompare_api_key, None);
        assert_eq!(config.http_timeout_secs, 30);
    }
}
