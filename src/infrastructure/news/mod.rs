pub mod rss;
pub mod sentiment_analyzer;

pub use rss::RssNewsService;
pub use sentiment_analyzer::SentimentAnalyzer;
