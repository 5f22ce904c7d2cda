//! Typed registry of every file exchanged through the artifact store.
//!
//! Each artifact has one producer stage, a fixed relative path and an
//! ordered column schema. Consumers check the schema structurally when
//! they read the file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    FeatureEngineering,
    Optimization,
}

impl Stage {
    pub const ALL: [Stage; 3] = [
        Stage::Ingestion,
        Stage::FeatureEngineering,
        Stage::Optimization,
    ];

    pub fn number(self) -> u8 {
        match self {
            Stage::Ingestion => 1,
            Stage::FeatureEngineering => 2,
            Stage::Optimization => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "ingestion",
            Stage::FeatureEngineering => "feature_engineering",
            Stage::Optimization => "optimization",
        };
        write!(f, "stage {} ({})", self.number(), name)
    }
}

/// Who reads an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    Stage(Stage),
    Reporting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactId {
    MarketRaw,
    NewsRaw,
    FeatureMatrix,
    MarketMood,
    Recommendations,
    MetricsSummary,
    CumulativeReturns,
    Drawdown,
}

#[derive(Debug, Clone, Copy)]
pub struct ArtifactSpec {
    pub id: ArtifactId,
    pub logical_name: &'static str,
    pub relative_path: &'static str,
    pub schema: &'static [&'static str],
    pub producer: Stage,
    pub consumers: &'static [Consumer],
}

impl ArtifactSpec {
    pub fn file_name(&self) -> &'static str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(self.relative_path)
    }

    pub fn header(&self) -> String {
        self.schema.join(",")
    }

    pub fn consumed_by(&self, stage: Stage) -> bool {
        self.consumers.contains(&Consumer::Stage(stage))
    }
}

pub const MARKET_RAW_SCHEMA: &[&str] = &[
    "date", "symbol", "rank", "open", "high", "low", "close", "volume",
];
pub const NEWS_RAW_SCHEMA: &[&str] = &["id", "published_at", "source", "title", "body", "categories"];
pub const FEATURE_MATRIX_SCHEMA: &[&str] = &[
    "date",
    "asset",
    "close",
    "ret_1d",
    "mom_7d",
    "mom_30d",
    "vol_30d",
    "rsi_14",
    "news_count",
    "sentiment",
];
pub const MARKET_MOOD_SCHEMA: &[&str] = &[
    "window_start",
    "window_end",
    "news_count",
    "market_sentiment_index",
];
pub const RECOMMENDATIONS_SCHEMA: &[&str] =
    &["asset", "date", "weight", "exp_ret", "exp_vol", "sharpe"];
pub const METRICS_SUMMARY_SCHEMA: &[&str] = &[
    "portfolio_cagr",
    "btc_cagr",
    "portfolio_sharpe",
    "btc_sharpe",
    "portfolio_mdd",
    "btc_mdd",
    "win_rate",
    "outperform_rate",
];
pub const CUMULATIVE_RETURNS_SCHEMA: &[&str] = &["date", "cum_portfolio", "cum_btc"];
pub const DRAWDOWN_SCHEMA: &[&str] = &["date", "portfolio_drawdown", "btc_drawdown"];

const FEATURES_ONLY: &[Consumer] = &[Consumer::Stage(Stage::FeatureEngineering)];
const OPTIMIZATION_ONLY: &[Consumer] = &[Consumer::Stage(Stage::Optimization)];
const REPORTING_ONLY: &[Consumer] = &[Consumer::Reporting];

pub static REGISTRY: [ArtifactSpec; 8] = [
    ArtifactSpec {
        id: ArtifactId::MarketRaw,
        logical_name: "market_raw",
        relative_path: "crypto/data/stage_1_crypto_data.csv",
        schema: MARKET_RAW_SCHEMA,
        producer: Stage::Ingestion,
        consumers: FEATURES_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::NewsRaw,
        logical_name: "news_raw",
        relative_path: "news/data/stage_1_news_raw.csv",
        schema: NEWS_RAW_SCHEMA,
        producer: Stage::Ingestion,
        consumers: FEATURES_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::FeatureMatrix,
        logical_name: "feature_matrix",
        relative_path: "station2/station2_feature_matrix.csv",
        schema: FEATURE_MATRIX_SCHEMA,
        producer: Stage::FeatureEngineering,
        consumers: OPTIMIZATION_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::MarketMood,
        logical_name: "market_mood",
        relative_path: "macro_sentiment_last7days.csv",
        schema: MARKET_MOOD_SCHEMA,
        producer: Stage::FeatureEngineering,
        consumers: REPORTING_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::Recommendations,
        logical_name: "latest_recommendations",
        relative_path: "station3/latest_recommendations.csv",
        schema: RECOMMENDATIONS_SCHEMA,
        producer: Stage::Optimization,
        consumers: REPORTING_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::MetricsSummary,
        logical_name: "metrics_summary",
        relative_path: "station3/metrics_summary.csv",
        schema: METRICS_SUMMARY_SCHEMA,
        producer: Stage::Optimization,
        consumers: REPORTING_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::CumulativeReturns,
        logical_name: "chart_data_cumulative_returns",
        relative_path: "station3/chart_data_cumulative_returns.csv",
        schema: CUMULATIVE_RETURNS_SCHEMA,
        producer: Stage::Optimization,
        consumers: REPORTING_ONLY,
    },
    ArtifactSpec {
        id: ArtifactId::Drawdown,
        logical_name: "chart_data_drawdown",
        relative_path: "station3/chart_data_drawdown.csv",
        schema: DRAWDOWN_SCHEMA,
        producer: Stage::Optimization,
        consumers: REPORTING_ONLY,
    },
];

impl ArtifactId {
    pub fn spec(self) -> &'static ArtifactSpec {
        // REGISTRY is declared in ArtifactId order
        &REGISTRY[self as usize]
    }
}

/// Artifacts written by `stage`.
pub fn outputs_of(stage: Stage) -> impl Iterator<Item = &'static ArtifactSpec> {
    REGISTRY.iter().filter(move |spec| spec.producer == stage)
}

/// Artifacts that must exist before `stage` may start.
pub fn inputs_of(stage: Stage) -> impl Iterator<Item = &'static ArtifactSpec> {
    REGISTRY.iter().filter(move |spec| spec.consumed_by(stage))
}
