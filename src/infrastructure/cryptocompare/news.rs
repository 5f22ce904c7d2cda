//! CryptoCompare news feed.
//!
//! The feed is cursor-paged: each page holds articles strictly older than the
//! previous page's oldest one. Requested page indices are reached by walking
//! the cursor from page 1.

use super::{DEFAULT_BASE_URL, parse_payload};
use crate::domain::ports::NewsProvider;
use crate::domain::types::NewsItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub struct CryptoCompareNews {
    client: Client,
    base_url: String,
}

impl CryptoCompareNews {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn fetch_page(&self, before: Option<i64>) -> Result<Vec<NewsRow>> {
        let url = format!("{}/data/v2/news/", self.base_url);
        let mut request = self.client.get(&url).query(&[("lang", "EN")]);
        if let Some(ts) = before {
            request = request.query(&[("lTs", ts.to_string())]);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch news from CryptoCompare")?;
        let payload: NewsResponse = parse_payload(response, "news").await?;
        Ok(payload.data)
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(rename = "Data", default)]
    data: Vec<NewsRow>,
}

#[derive(Debug, Deserialize)]
struct NewsRow {
    id: serde_json::Value,
    published_on: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    categories: String,
    #[serde(default)]
    source: String,
}

impl NewsRow {
    fn into_item(self) -> Option<NewsItem> {
        let published = DateTime::from_timestamp(self.published_on, 0)?;
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Some(NewsItem {
            id,
            published_at: published.to_rfc3339(),
            source: self.source,
            title: self.title,
            body: self.body,
            categories: self.categories,
        })
    }
}

#[async_trait]
impl NewsProvider for CryptoCompareNews {
    async fn fetch_news(&self, pages: &[u32]) -> Result<Vec<NewsItem>> {
        let last_page = pages.iter().copied().max().unwrap_or(0);
        let mut cursor: Option<i64> = None;
        let mut items = Vec::new();

        for page in 1..=last_page {
            let rows = self
                .fetch_page(cursor)
                .await
                .with_context(|| format!("News page {} failed", page))?;
            if rows.is_empty() {
                warn!("CryptoCompare news feed exhausted at page {}", page);
                break;
            }

            cursor = rows.iter().map(|row| row.published_on).min().map(|ts| ts - 1);
            if pages.contains(&page) {
                debug!("CryptoCompare: news page {} has {} articles", page, rows.len());
                items.extend(rows.into_iter().filter_map(NewsRow::into_item));
            }
        }

        info!(
            "CryptoCompare: fetched {} articles from {} page(s)",
            items.len(),
            pages.len()
        );
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_news_row_conversion() {
        let value = json!({
            "Data": [
                {
                    "id": "708235",
                    "published_on": 1704067200,
                    "title": "Bitcoin opens the year higher",
                    "body": "Markets rallied.",
                    "categories": "BTC|Market",
                    "source": "coindesk"
                },
                {
                    "id": 708236,
                    "published_on": 1704070800,
                    "title": "Ether follows",
                    "categories": "ETH"
                }
            ]
        });

        let payload: NewsResponse = serde_json::from_value(value).unwrap();
        let items: Vec<NewsItem> = payload
            .data
            .into_iter()
            .filter_map(NewsRow::into_item)
            .collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "708235");
        assert_eq!(items[1].id, "708236");
        assert!(items[0].mentions("BTC"));
        assert_eq!(
            items[0].published_date().unwrap().to_string(),
            "2024-01-01"
        );
        assert!(items[1].body.is_empty());
    }
}
