//! Local news sentiment scoring.
//!
//! VADER compound polarity blended with a crypto-market lexicon, so that
//! jargon like "rally" or "rug pull" moves the score even when VADER's
//! general-purpose dictionary is indifferent to it.

use crate::domain::types::NewsItem;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Signed weights for market jargon; negative values are bearish.
const MARKET_LEXICON: &[(&str, f64)] = &[
    ("all-time high", 0.5),
    ("record high", 0.4),
    ("rally", 0.4),
    ("surge", 0.4),
    ("soar", 0.5),
    ("bullish", 0.5),
    ("breakout", 0.3),
    ("inflows", 0.3),
    ("etf approval", 0.5),
    ("adoption", 0.2),
    ("partnership", 0.2),
    ("upgrade", 0.3),
    ("accumulat", 0.2),
    ("crash", -0.5),
    ("plunge", -0.5),
    ("slump", -0.4),
    ("bearish", -0.5),
    ("sell-off", -0.4),
    ("selloff", -0.4),
    ("outflows", -0.3),
    ("liquidation", -0.3),
    ("lawsuit", -0.4),
    ("crackdown", -0.4),
    ("ban", -0.4),
    ("hack", -0.5),
    ("exploit", -0.5),
    ("rug pull", -0.6),
    ("scam", -0.6),
    ("fraud", -0.5),
    ("insolvency", -0.5),
    ("bankrupt", -0.6),
    ("delist", -0.4),
];

const LEXICON_WEIGHT: f64 = 0.5;
const TITLE_WEIGHT: f64 = 0.7;

pub struct SentimentAnalyzer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    fn lexicon_boost(text: &str) -> f64 {
        let lower = text.to_lowercase();
        MARKET_LEXICON
            .iter()
            .filter(|(term, _)| lower.contains(term))
            .map(|(_, weight)| weight)
            .sum()
    }

    /// Score a piece of text in [-1, 1].
    pub fn score_text(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }

        let compound = self.analyzer.polarity_scores(text)["compound"];
        (compound + Self::lexicon_boost(text) * LEXICON_WEIGHT).clamp(-1.0, 1.0)
    }

    /// Score an article; the headline carries most of the weight.
    pub fn score(&self, item: &NewsItem) -> f64 {
        if item.body.trim().is_empty() {
            return self.score_text(&item.title);
        }
        self.score_text(&item.title) * TITLE_WEIGHT
            + self.score_text(&item.body) * (1.0 - TITLE_WEIGHT)
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, body: &str) -> NewsItem {
        NewsItem {
            id: "n1".to_string(),
            published_at: "2024-01-01T00:00:00+00:00".to_string(),
            source: "test".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            categories: "BTC".to_string(),
        }
    }

    #[test]
    fn test_bullish_and_bearish_headlines() {
        let analyzer = SentimentAnalyzer::new();

        for headline in [
            "Bitcoin surges to new all-time high as ETF inflows accelerate",
            "Ethereum rally extends, traders turn bullish",
        ] {
            let score = analyzer.score_text(headline);
            assert!(score > 0.0, "Expected bullish score for '{}', got {}", headline, score);
        }

        for headline in [
            "Exchange hacked, funds stolen in massive exploit",
            "Altcoins crash as regulators announce crackdown",
        ] {
            let score = analyzer.score_text(headline);
            assert!(score < 0.0, "Expected bearish score for '{}', got {}", headline, score);
        }
    }

    #[test]
    fn test_empty_text() {
        let analyzer = SentimentAnalyzer::new();
        assert_eq!(analyzer.score_text(""), 0.0);
        assert_eq!(analyzer.score_text("   "), 0.0);
    }

    #[test]
    fn test_article_uses_title_when_body_missing() {
        let analyzer = SentimentAnalyzer::new();
        let headline = "Bitcoin rally lifts the whole market";

        let article = item(headline, "");
        assert_eq!(analyzer.score(&article), analyzer.score_text(headline));

        let with_body = item(headline, "Trading volume was in line with the weekly average.");
        assert!(analyzer.score(&with_body) > 0.0);
    }

    #[test]
    fn test_scores_are_bounded() {
        let analyzer = SentimentAnalyzer::new();
        let score = analyzer.score_text(
            "surge rally soar bullish breakout all-time high record high adoption upgrade",
        );
        assert!(score <= 1.0);
    }
}
