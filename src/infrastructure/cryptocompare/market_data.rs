//! CryptoCompare market data: top-by-market-cap listing and daily history.

use super::{DEFAULT_BASE_URL, decode_payload, parse_payload};
use crate::domain::ports::MarketDataProvider;
use crate::domain::types::{AssetListing, MarketBar};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub struct CryptoCompareMarketData {
    client: Client,
    base_url: String,
}

impl CryptoCompareMarketData {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopListResponse {
    #[serde(rename = "Data", default)]
    data: Vec<TopListEntry>,
}

#[derive(Debug, Deserialize)]
struct TopListEntry {
    #[serde(rename = "CoinInfo")]
    coin_info: CoinInfo,
}

#[derive(Debug, Deserialize)]
struct CoinInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "FullName", default)]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Data")]
    data: HistoDayData,
}

#[derive(Debug, Deserialize)]
struct HistoDayData {
    #[serde(rename = "Data", default)]
    rows: Vec<HistoDayRow>,
}

#[derive(Debug, Deserialize)]
struct HistoDayRow {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volumeto: f64,
}

fn listings_from(response: TopListResponse, page: u32, limit: usize) -> Vec<AssetListing> {
    let offset = page.saturating_sub(1) as usize * limit;
    response
        .data
        .into_iter()
        .enumerate()
        .map(|(index, entry)| AssetListing {
            rank: (offset + index + 1) as u32,
            name: if entry.coin_info.full_name.is_empty() {
                entry.coin_info.name.clone()
            } else {
                entry.coin_info.full_name
            },
            symbol: entry.coin_info.name,
        })
        .collect()
}

fn bars_from(response: HistoDayResponse, listing: &AssetListing) -> Vec<MarketBar> {
    response
        .data
        .rows
        .into_iter()
        // Days before the asset was listed come back as zero-filled rows
        .filter(|row| row.close > 0.0)
        .filter_map(|row| {
            let date = DateTime::from_timestamp(row.time, 0)?.date_naive();
            Some(MarketBar {
                date,
                symbol: listing.symbol.clone(),
                rank: listing.rank,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volumeto,
            })
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for CryptoCompareMarketData {
    async fn top_assets(
        &self,
        page: u32,
        limit: usize,
        currency: &str,
    ) -> Result<Vec<AssetListing>> {
        let url = format!("{}/data/top/mktcapfull", self.base_url);
        let provider_page = page.saturating_sub(1).to_string();
        let limit_str = limit.to_string();

        debug!("CryptoCompare: fetching top list page {}", page);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("limit", limit_str.as_str()),
                ("page", provider_page.as_str()),
                ("tsym", currency),
            ])
            .send()
            .await
            .context("Failed to fetch top list from CryptoCompare")?;

        let payload: TopListResponse = parse_payload(response, "top list").await?;
        let listings = listings_from(payload, page, limit);
        info!(
            "CryptoCompare: page {} listed {} assets",
            page,
            listings.len()
        );
        Ok(listings)
    }

    async fn daily_history(
        &self,
        listing: &AssetListing,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<MarketBar>> {
        let url = format!("{}/data/v2/histoday", self.base_url);
        // histoday returns limit + 1 rows
        let limit_str = limit.saturating_sub(1).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fsym", listing.symbol.as_str()),
                ("tsym", currency),
                ("limit", limit_str.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch daily history for {}", listing.symbol))?;

        let payload: HistoDayResponse = parse_payload(response, "histoday")
            .await
            .with_context(|| format!("History request for {} failed", listing.symbol))?;
        let bars = bars_from(payload, listing);
        debug!(
            "CryptoCompare: fetched {} daily bars for {}",
            bars.len(),
            listing.symbol
        );
        Ok(bars)
    }
}

/// Decodes a raw top-list payload; exposed for fixture-driven tests.
pub fn parse_top_list(value: serde_json::Value, page: u32, limit: usize) -> Result<Vec<AssetListing>> {
    let payload: TopListResponse = decode_payload(value, "top list")?;
    Ok(listings_from(payload, page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn btc() -> AssetListing {
        AssetListing {
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            rank: 1,
        }
    }

    #[test]
    fn test_top_list_ranks_follow_page() {
        let value = json!({
            "Data": [
                {"CoinInfo": {"Name": "SOL", "FullName": "Solana"}},
                {"CoinInfo": {"Name": "XRP", "FullName": ""}}
            ]
        });

        let listings = parse_top_list(value, 2, 100).unwrap();
        assert_eq!(listings[0].rank, 101);
        assert_eq!(listings[0].name, "Solana");
        assert_eq!(listings[1].rank, 102);
        assert_eq!(listings[1].name, "XRP");
    }

    #[test]
    fn test_history_skips_zero_rows() {
        let value = json!({
            "Response": "Success",
            "Data": {
                "Data": [
                    {"time": 1704067200, "open": 0.0, "high": 0.0, "low": 0.0, "close": 0.0, "volumeto": 0.0},
                    {"time": 1704153600, "open": 42000.0, "high": 43000.0, "low": 41500.0, "close": 42800.0, "volumeto": 1.5e9}
                ]
            }
        });

        let payload: HistoDayResponse = decode_payload(value, "histoday").unwrap();
        let bars = bars_from(payload, &btc());
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date.to_string(), "2024-01-02");
        assert_eq!(bars[0].close, 42800.0);
        assert_eq!(bars[0].rank, 1);
    }
}
