//! CryptoCompare REST adapters for Stage 1.
//!
//! Both endpoints answer HTTP 200 even on failure and signal errors with
//! `{"Response": "Error", "Message": ...}`; `parse_payload` turns that into
//! an `Err` before the body is decoded.

pub mod market_data;
pub mod news;

pub use market_data::CryptoCompareMarketData;
pub use news::CryptoCompareNews;

use anyhow::{Context, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

pub(crate) async fn parse_payload<T: DeserializeOwned>(
    response: Response,
    endpoint: &str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("CryptoCompare {} failed ({}): {}", endpoint, status, error_text);
    }

    let value: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("Failed to read CryptoCompare {} response", endpoint))?;
    decode_payload(value, endpoint)
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    value: serde_json::Value,
    endpoint: &str,
) -> Result<T> {
    if value.get("Response").and_then(|r| r.as_str()) == Some("Error") {
        let message = value
            .get("Message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("CryptoCompare {} returned an error: {}", endpoint, message);
    }

    serde_json::from_value(value)
        .with_context(|| format!("Failed to parse CryptoCompare {} response", endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(rename = "Data")]
        data: Vec<u32>,
    }

    #[test]
    fn test_error_envelope_is_rejected() {
        let value = json!({"Response": "Error", "Message": "rate limit exceeded"});
        let err = decode_payload::<Payload>(value, "histoday").unwrap_err();
        assert!(err.to_string().contains("rate limit exceeded"));
    }

    #[test]
    fn test_success_payload_decodes() {
        let value = json!({"Response": "Success", "Data": [1, 2, 3]});
        let payload: Payload = decode_payload(value, "top list").unwrap();
        assert_eq!(payload.data, vec![1, 2, 3]);
    }
}
