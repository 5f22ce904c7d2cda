//! Rows produced by the optimization stage and read by the reporting layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub asset: String,
    pub date: NaiveDate,
    /// Portfolio weight in [0, 1]
    pub weight: f64,
    /// Annualized expected return
    pub exp_ret: f64,
    /// Annualized expected volatility
    pub exp_vol: f64,
    pub sharpe: f64,
}

/// Single-row performance summary of the backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub portfolio_cagr: f64,
    pub btc_cagr: f64,
    pub portfolio_sharpe: f64,
    pub btc_sharpe: f64,
    /// Maximum drawdown as a non-positive fraction
    pub portfolio_mdd: f64,
    pub btc_mdd: f64,
    pub win_rate: f64,
    pub outperform_rate: f64,
}

/// One day of the backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    pub portfolio_return: f64,
    pub btc_return: f64,
    pub cum_portfolio: f64,
    pub cum_btc: f64,
    pub portfolio_drawdown: f64,
    pub btc_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeReturnRow {
    pub date: NaiveDate,
    pub cum_portfolio: f64,
    pub cum_btc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownRow {
    pub date: NaiveDate,
    pub portfolio_drawdown: f64,
    pub btc_drawdown: f64,
}

impl From<&BacktestPoint> for CumulativeReturnRow {
    fn from(point: &BacktestPoint) -> Self {
        Self {
            date: point.date,
            cum_portfolio: point.cum_portfolio,
            cum_btc: point.cum_btc,
        }
    }
}

impl From<&BacktestPoint> for DrawdownRow {
    fn from(point: &BacktestPoint) -> Self {
        Self {
            date: point.date,
            portfolio_drawdown: point.portfolio_drawdown,
            btc_drawdown: point.btc_drawdown,
        }
    }
}

/// Everything Stage 3 computes from one snapshot of the feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub recommendations: Vec<Recommendation>,
    pub backtest: Vec<BacktestPoint>,
    pub metrics: MetricsSummary,
}
