use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates the shared HTTP client used by data providers.
    ///
    /// Requests are attempted once; a failed call fails the stage that made it.
    pub fn create_client(timeout_secs: u64) -> Client {
        Self::builder(timeout_secs)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    /// Same as `create_client`, sending `authorization: Apikey <key>` on every request.
    pub fn create_authorized_client(timeout_secs: u64, api_key: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Apikey {}", api_key))
            .context("API key contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, value);

        Self::builder(timeout_secs)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")
    }

    fn builder(timeout_secs: u64) -> reqwest::ClientBuilder {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("quanteye/", env!("CARGO_PKG_VERSION")))
    }
}
