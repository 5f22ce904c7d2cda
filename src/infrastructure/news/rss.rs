//! RSS news source.
//!
//! A feed is a single snapshot, so only page 1 yields articles. Tickers are
//! inferred from the item's categories and well-known coin names in the
//! headline so that Stage 2 can attribute the article to assets.

use crate::domain::ports::NewsProvider;
use crate::domain::types::NewsItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use rss::{Channel, Item};
use std::collections::BTreeSet;
use std::io::Cursor;
use tracing::{info, warn};
use uuid::Uuid;

const COIN_NAMES: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("ether ", "ETH"),
    ("solana", "SOL"),
    ("binance coin", "BNB"),
    ("ripple", "XRP"),
    ("cardano", "ADA"),
    ("dogecoin", "DOGE"),
    ("avalanche", "AVAX"),
    ("polkadot", "DOT"),
    ("chainlink", "LINK"),
    ("litecoin", "LTC"),
    ("tron", "TRX"),
    ("toncoin", "TON"),
];

pub struct RssNewsService {
    url: String,
    client: Client,
}

impl RssNewsService {
    pub fn new(url: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }
}

fn infer_categories(item: &Item) -> String {
    let mut tags: BTreeSet<String> = item
        .categories()
        .iter()
        .map(|c| c.name().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let title = format!("{} ", item.title().unwrap_or_default().to_lowercase());
    for (name, symbol) in COIN_NAMES {
        if title.contains(name) {
            tags.insert(symbol.to_string());
        }
    }
    tags.into_iter().collect::<Vec<_>>().join("|")
}

/// Converts a parsed channel into news items; items without a parseable
/// publish date are dropped.
pub fn items_from_channel(channel: &Channel, source: &str) -> Vec<NewsItem> {
    channel
        .items()
        .iter()
        .filter_map(|item| {
            // RSS dates are RFC-2822
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())?;
            let id = item
                .guid()
                .map(|g| g.value().to_string())
                .or_else(|| item.link().map(|l| l.to_string()))
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            Some(NewsItem {
                id,
                published_at: published.to_utc().to_rfc3339(),
                source: source.to_string(),
                title: item.title().unwrap_or("No Title").to_string(),
                body: item.description().unwrap_or("").to_string(),
                categories: infer_categories(item),
            })
        })
        .collect()
}

#[async_trait]
impl NewsProvider for RssNewsService {
    async fn fetch_news(&self, pages: &[u32]) -> Result<Vec<NewsItem>> {
        if !pages.contains(&1) {
            warn!("RSS feed has a single page; requested pages {:?} yield nothing", pages);
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch RSS feed {}", self.url))?;
        if !response.status().is_success() {
            anyhow::bail!("RSS feed {} answered {}", self.url, response.status());
        }
        let bytes = response
            .bytes()
            .await
            .context("Failed to read RSS feed body")?;
        let channel = Channel::read_from(Cursor::new(bytes))
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse RSS feed")?;

        let source = if channel.title().is_empty() {
            "RSS".to_string()
        } else {
            channel.title().to_string()
        };
        let items = items_from_channel(&channel, &source);
        info!("RSS: {} articles from {}", items.len(), source);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Crypto Wire</title>
    <link>https://example.com</link>
    <description>test feed</description>
    <item>
      <title>Bitcoin and Solana lead the rally</title>
      <guid>abc-1</guid>
      <category>Markets</category>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <description>Prices rose.</description>
    </item>
    <item>
      <title>Undated item</title>
      <guid>abc-2</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_items_from_channel() {
        let channel = Channel::read_from(FEED.as_bytes()).unwrap();
        let items = items_from_channel(&channel, "Crypto Wire");

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "abc-1");
        assert!(item.mentions("BTC"));
        assert!(item.mentions("SOL"));
        assert!(item.mentions("Markets"));
        assert_eq!(item.published_date().unwrap().to_string(), "2024-01-01");
    }

    #[tokio::test]
    async fn test_pages_beyond_first_are_empty() {
        let service = RssNewsService::new("http://127.0.0.1:9/feed", Client::new());
        let items = service.fetch_news(&[2, 3]).await.unwrap();
        assert!(items.is_empty());
    }
}
