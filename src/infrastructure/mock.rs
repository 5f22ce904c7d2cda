//! Deterministic synthetic providers.
//!
//! Used for offline runs (`QUANTEYE_MODE=mock`) and tests. Output depends
//! only on the requested parameters, never on the wall clock.

use crate::domain::ports::{MarketDataProvider, NewsProvider};
use crate::domain::types::{AssetListing, MarketBar, NewsItem};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Assets in market-cap order.
pub const MOCK_UNIVERSE: &[(&str, &str)] = &[
    ("BTC", "Bitcoin"),
    ("ETH", "Ethereum"),
    ("SOL", "Solana"),
    ("BNB", "BNB"),
    ("XRP", "XRP"),
    ("ADA", "Cardano"),
    ("DOGE", "Dogecoin"),
    ("AVAX", "Avalanche"),
    ("DOT", "Polkadot"),
    ("LINK", "Chainlink"),
    ("LTC", "Litecoin"),
    ("ATOM", "Cosmos"),
];

const HEADLINES: &[&str] = &[
    "{name} rally extends as inflows climb",
    "{name} slumps after exchange outflows",
    "Analysts turn bullish on {name} ahead of upgrade",
    "{name} trading volume steady through the session",
    "Regulators weigh crackdown affecting {name} markets",
    "{name} partnership announced with payments firm",
];

fn seed_for(tag: &str) -> u64 {
    tag.bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
        })
}

/// End of the synthetic history.
pub fn default_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

pub struct MockMarketData {
    anchor: NaiveDate,
    failing_symbol: Option<String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            anchor: default_anchor(),
            failing_symbol: None,
        }
    }

    pub fn with_anchor(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            failing_symbol: None,
        }
    }

    /// Makes history requests for `symbol` fail, simulating a provider outage.
    pub fn failing_on(mut self, symbol: impl Into<String>) -> Self {
        self.failing_symbol = Some(symbol.into());
        self
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn top_assets(
        &self,
        page: u32,
        limit: usize,
        _currency: &str,
    ) -> Result<Vec<AssetListing>> {
        let offset = (page.saturating_sub(1) as usize).saturating_mul(limit);
        Ok(MOCK_UNIVERSE
            .iter()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(index, (symbol, name))| AssetListing {
                symbol: symbol.to_string(),
                name: name.to_string(),
                rank: index as u32 + 1,
            })
            .collect())
    }

    async fn daily_history(
        &self,
        listing: &AssetListing,
        _currency: &str,
        limit: usize,
    ) -> Result<Vec<MarketBar>> {
        if self.failing_symbol.as_deref() == Some(listing.symbol.as_str()) {
            anyhow::bail!("mock provider outage for {}", listing.symbol);
        }

        let mut rng = StdRng::seed_from_u64(seed_for(&listing.symbol));
        let drift = rng.random_range(-0.0005..0.0025);
        let amplitude = rng.random_range(0.015..0.05);
        let mut close = rng.random_range(1.0..500.0) * 100.0 / listing.rank as f64;

        let start = self.anchor - Duration::days(limit as i64 - 1);
        let mut bars = Vec::with_capacity(limit);
        for day in 0..limit {
            let open = close;
            let shock = rng.random_range(-1.0..1.0) * amplitude;
            close = (open * (1.0 + drift + shock)).max(1e-6);
            let spread = open.max(close) * rng.random_range(0.0..amplitude / 2.0);
            bars.push(MarketBar {
                date: start + Duration::days(day as i64),
                symbol: listing.symbol.clone(),
                rank: listing.rank,
                open,
                high: open.max(close) + spread,
                low: (open.min(close) - spread).max(1e-6),
                close,
                volume: rng.random_range(1.0e6..5.0e8),
            });
        }
        Ok(bars)
    }
}

pub struct MockNews {
    anchor: NaiveDate,
    per_page: usize,
}

impl MockNews {
    pub fn new() -> Self {
        Self {
            anchor: default_anchor(),
            per_page: 50,
        }
    }

    pub fn with_anchor(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            ..Self::new()
        }
    }
}

impl Default for MockNews {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsProvider for MockNews {
    async fn fetch_news(&self, pages: &[u32]) -> Result<Vec<NewsItem>> {
        let mut items = Vec::new();
        for &page in pages {
            let mut rng = StdRng::seed_from_u64(seed_for(&format!("news-{page}")));
            for slot in 0..self.per_page {
                // Page 1 is the most recent; two articles per synthetic hour
                let age_hours = ((page.saturating_sub(1) as usize) * self.per_page + slot) as i64 * 2;
                let published = self
                    .anchor
                    .and_hms_opt(23, 0, 0)
                    .unwrap_or_default()
                    - Duration::hours(age_hours);

                let (symbol, name) = MOCK_UNIVERSE[rng.random_range(0..MOCK_UNIVERSE.len())];
                let template = HEADLINES[rng.random_range(0..HEADLINES.len())];

                items.push(NewsItem {
                    id: format!("mock-{page}-{slot}"),
                    published_at: published.and_utc().to_rfc3339(),
                    source: "mockwire".to_string(),
                    title: template.replace("{name}", name),
                    body: String::new(),
                    categories: format!("{symbol}|Market"),
                });
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_top_assets_paging() {
        let provider = MockMarketData::new();
        let first = provider.top_assets(1, 5, "USD").await.unwrap();
        let second = provider.top_assets(2, 5, "USD").await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first[0].symbol, "BTC");
        assert_eq!(second[0].rank, 6);
        assert!(provider.top_assets(9, 5, "USD").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_deterministic() {
        let provider = MockMarketData::new();
        let listing = provider.top_assets(1, 1, "USD").await.unwrap().remove(0);

        let a = provider.daily_history(&listing, "USD", 60).await.unwrap();
        let b = provider.daily_history(&listing, "USD", 60).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 60);
        assert_eq!(a.last().unwrap().date, default_anchor());
        assert!(a.iter().all(|bar| bar.low <= bar.close && bar.close <= bar.high));
    }

    #[tokio::test]
    async fn test_failing_symbol() {
        let provider = MockMarketData::new().failing_on("ETH");
        let listings = provider.top_assets(1, 2, "USD").await.unwrap();
        assert!(provider.daily_history(&listings[0], "USD", 10).await.is_ok());
        assert!(provider.daily_history(&listings[1], "USD", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_news_pages() {
        let news = MockNews::new();
        let items = news.fetch_news(&[1, 2]).await.unwrap();
        assert_eq!(items.len(), 100);
        assert!(items.iter().all(|item| item.published_date().is_some()));
        assert_ne!(items[0].id, items[50].id);
    }
}
