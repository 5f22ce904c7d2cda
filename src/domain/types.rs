use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One entry of the provider's top-by-market-cap listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetListing {
    pub symbol: String,
    pub name: String,
    pub rank: u32,
}

/// Daily OHLCV bar, one row of the raw market dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub date: NaiveDate,
    pub symbol: String,
    pub rank: u32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One article of the raw news dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    /// RFC 3339 timestamp
    pub published_at: String,
    pub source: String,
    pub title: String,
    pub body: String,
    /// Pipe-separated tickers and topics, e.g. `BTC|ETH|Trading`
    pub categories: String,
}

impl NewsItem {
    pub fn published_date(&self) -> Option<NaiveDate> {
        chrono::DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|ts| ts.date_naive())
    }

    pub fn mentions(&self, asset: &str) -> bool {
        self.categories
            .split('|')
            .any(|tag| tag.trim().eq_ignore_ascii_case(asset))
    }
}

/// One (date, asset) row of the engineered feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub asset: String,
    pub close: f64,
    pub ret_1d: f64,
    pub mom_7d: f64,
    pub mom_30d: f64,
    pub vol_30d: f64,
    pub rsi_14: f64,
    pub news_count: u32,
    pub sentiment: f64,
}

impl FeatureRow {
    /// First non-finite numeric field, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("close", self.close),
            ("ret_1d", self.ret_1d),
            ("mom_7d", self.mom_7d),
            ("mom_30d", self.mom_30d),
            ("vol_30d", self.vol_30d),
            ("rsi_14", self.rsi_14),
            ("sentiment", self.sentiment),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(name, _)| name)
    }
}

/// Market-wide news mood over the trailing week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMood {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub news_count: u32,
    /// 0 = extreme fear, 50 = neutral, 100 = extreme greed
    pub market_sentiment_index: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news(categories: &str) -> NewsItem {
        NewsItem {
            id: "1".to_string(),
            published_at: "2024-03-05T14:30:00+00:00".to_string(),
            source: "coindesk".to_string(),
            title: "title".to_string(),
            body: String::new(),
            categories: categories.to_string(),
        }
    }

    #[test]
    fn test_news_mentions() {
        let item = news("BTC|ETH|Trading");
        assert!(item.mentions("BTC"));
        assert!(item.mentions("eth"));
        assert!(!item.mentions("SOL"));
    }

    #[test]
    fn test_news_published_date() {
        let item = news("BTC");
        assert_eq!(
            item.published_date(),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );

        let mut bad = news("BTC");
        bad.published_at = "yesterday".to_string();
        assert_eq!(bad.published_date(), None);
    }
}
