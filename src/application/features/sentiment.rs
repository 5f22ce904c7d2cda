use crate::domain::types::{MarketMood, NewsItem};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// Trailing window of the market mood index, in days.
pub const MOOD_WINDOW_DAYS: i64 = 7;

/// Mean news sentiment per (ticker, day).
#[derive(Debug, Default)]
pub struct DailySentiment {
    buckets: HashMap<(String, NaiveDate), (f64, u32)>,
}

impl DailySentiment {
    /// Buckets each scored article under every tag it carries.
    pub fn from_scored(news: &[NewsItem], scores: &[f64]) -> Self {
        let mut buckets: HashMap<(String, NaiveDate), (f64, u32)> = HashMap::new();
        for (item, &score) in news.iter().zip(scores) {
            let Some(date) = item.published_date() else {
                continue;
            };
            for tag in item.categories.split('|').map(str::trim).filter(|t| !t.is_empty()) {
                let bucket = buckets.entry((tag.to_uppercase(), date)).or_insert((0.0, 0));
                bucket.0 += score;
                bucket.1 += 1;
            }
        }
        Self { buckets }
    }

    /// `(news_count, mean_sentiment)`; a day without news is neutral.
    pub fn get(&self, symbol: &str, date: NaiveDate) -> (u32, f64) {
        match self.buckets.get(&(symbol.to_uppercase(), date)) {
            Some(&(sum, count)) if count > 0 => (count, sum / count as f64),
            _ => (0, 0.0),
        }
    }
}

/// Market-wide mood over the last `MOOD_WINDOW_DAYS` days of the news set.
///
/// The window ends on the most recent article's date, so the index depends
/// only on the data. Mean sentiment in [-1, 1] maps linearly onto [0, 100].
pub fn market_mood(news: &[NewsItem], scores: &[f64]) -> Option<MarketMood> {
    let dated: Vec<(NaiveDate, f64)> = news
        .iter()
        .zip(scores)
        .filter_map(|(item, &score)| item.published_date().map(|date| (date, score)))
        .collect();

    let window_end = dated.iter().map(|(date, _)| *date).max()?;
    let window_start = window_end - Duration::days(MOOD_WINDOW_DAYS - 1);

    let recent: Vec<f64> = dated
        .iter()
        .filter(|(date, _)| *date >= window_start)
        .map(|(_, score)| *score)
        .collect();
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;

    Some(MarketMood {
        window_start,
        window_end,
        news_count: recent.len() as u32,
        market_sentiment_index: ((mean.clamp(-1.0, 1.0) + 1.0) * 50.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news(id: &str, published_at: &str, categories: &str) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            published_at: published_at.to_string(),
            source: "test".to_string(),
            title: String::new(),
            body: String::new(),
            categories: categories.to_string(),
        }
    }

    #[test]
    fn test_daily_buckets_by_tag() {
        let items = vec![
            news("1", "2024-03-01T08:00:00+00:00", "BTC|Market"),
            news("2", "2024-03-01T12:00:00+00:00", "btc"),
            news("3", "2024-03-02T12:00:00+00:00", "ETH"),
        ];
        let daily = DailySentiment::from_scored(&items, &[0.6, -0.2, 0.5]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let (count, mean) = daily.get("BTC", day);
        assert_eq!(count, 2);
        assert!((mean - 0.2).abs() < 1e-12);
        assert_eq!(daily.get("ETH", day), (0, 0.0));
    }

    #[test]
    fn test_market_mood_window() {
        let items = vec![
            news("old", "2024-02-01T00:00:00+00:00", "BTC"),
            news("a", "2024-03-04T00:00:00+00:00", "BTC"),
            news("b", "2024-03-10T00:00:00+00:00", "ETH"),
        ];
        let mood = market_mood(&items, &[-1.0, 0.2, 0.6]).unwrap();

        assert_eq!(mood.window_end, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(mood.window_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(mood.news_count, 2);
        assert!((mood.market_sentiment_index - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_mood_needs_dated_news() {
        let items = vec![news("x", "not a date", "BTC")];
        assert!(market_mood(&items, &[0.5]).is_none());
    }
}
