//! Weekly-rebalanced backtest against the BTC benchmark.

use crate::application::optimization::allocator::{
    AssetSignal, mean_variance_weights, select_candidates,
};
use crate::domain::errors::OptimizationError;
use crate::domain::optimization_config::OptimizationConfig;
use crate::domain::performance::Stats;
use crate::domain::report::{BacktestPoint, MetricsSummary, Recommendation};
use crate::domain::types::FeatureRow;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

pub const BENCHMARK: &str = "BTC";
pub const REBALANCE_EVERY_DAYS: usize = 7;
pub const MIN_BACKTEST_POINTS: usize = 2;

/// Feature rows indexed by date, then asset.
pub struct FeaturePanel<'a> {
    by_date: BTreeMap<NaiveDate, BTreeMap<&'a str, &'a FeatureRow>>,
}

impl<'a> FeaturePanel<'a> {
    pub fn new(rows: &'a [FeatureRow]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<&'a str, &'a FeatureRow>> = BTreeMap::new();
        for row in rows {
            by_date
                .entry(row.date)
                .or_default()
                .insert(row.asset.as_str(), row);
        }
        Self { by_date }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.by_date.keys().copied().collect()
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.by_date.values().any(|rows| rows.contains_key(asset))
    }

    fn ret_1d(&self, date: NaiveDate, asset: &str) -> f64 {
        self.by_date
            .get(&date)
            .and_then(|rows| rows.get(asset))
            .map(|row| row.ret_1d)
            .unwrap_or(0.0)
    }

    /// Selected candidates and their weights on `date`.
    pub fn allocate(
        &self,
        date: NaiveDate,
        config: &OptimizationConfig,
    ) -> Result<Vec<(AssetSignal, f64)>, OptimizationError> {
        let signals: Vec<AssetSignal> = self
            .by_date
            .get(&date)
            .map(|rows| rows.values().map(|row| AssetSignal::from_row(row)).collect())
            .unwrap_or_default();

        let candidates = select_candidates(signals, config.universe_size_cap);
        let weights = mean_variance_weights(&candidates, config.risk_aversion, date)?;
        Ok(candidates.into_iter().zip(weights).collect())
    }
}

/// Daily portfolio and benchmark curves.
///
/// Weights chosen on a rebalance date apply from the following day through
/// the next rebalance date inclusive.
pub fn run_backtest(
    panel: &FeaturePanel<'_>,
    config: &OptimizationConfig,
) -> Result<Vec<BacktestPoint>, OptimizationError> {
    if !panel.has_asset(BENCHMARK) {
        return Err(OptimizationError::MissingBenchmark {
            asset: BENCHMARK.to_string(),
        });
    }

    let dates = panel.dates();
    let points = dates.len().saturating_sub(1);
    if points < MIN_BACKTEST_POINTS {
        return Err(OptimizationError::InsufficientHistory {
            points,
            required: MIN_BACKTEST_POINTS,
        });
    }

    let mut holdings: Vec<(String, f64)> = Vec::new();
    let mut portfolio_returns = Vec::with_capacity(points);
    let mut btc_returns = Vec::with_capacity(points);

    for (i, &date) in dates.iter().enumerate() {
        if i > 0 {
            let portfolio: f64 = holdings
                .iter()
                .map(|(asset, weight)| weight * panel.ret_1d(date, asset))
                .sum();
            portfolio_returns.push(portfolio);
            btc_returns.push(panel.ret_1d(date, BENCHMARK));
        }

        if i % REBALANCE_EVERY_DAYS == 0 && i + 1 < dates.len() {
            holdings = panel
                .allocate(date, config)?
                .into_iter()
                .map(|(signal, weight)| (signal.asset, weight))
                .collect();
            debug!("Rebalanced on {} into {} assets", date, holdings.len());
        }
    }

    let cum_portfolio = Stats::cumulative(&portfolio_returns);
    let cum_btc = Stats::cumulative(&btc_returns);
    let dd_portfolio = Stats::drawdowns(&cum_portfolio);
    let dd_btc = Stats::drawdowns(&cum_btc);

    Ok(dates[1..]
        .iter()
        .enumerate()
        .map(|(k, &date)| BacktestPoint {
            date,
            portfolio_return: portfolio_returns[k],
            btc_return: btc_returns[k],
            cum_portfolio: cum_portfolio[k],
            cum_btc: cum_btc[k],
            portfolio_drawdown: dd_portfolio[k],
            btc_drawdown: dd_btc[k],
        })
        .collect())
}

pub fn summarize(backtest: &[BacktestPoint]) -> MetricsSummary {
    let n = backtest.len();
    let portfolio: Vec<f64> = backtest.iter().map(|p| p.portfolio_return).collect();
    let btc: Vec<f64> = backtest.iter().map(|p| p.btc_return).collect();
    let cum_portfolio: Vec<f64> = backtest.iter().map(|p| p.cum_portfolio).collect();
    let cum_btc: Vec<f64> = backtest.iter().map(|p| p.cum_btc).collect();

    let share = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };

    MetricsSummary {
        portfolio_cagr: Stats::cagr(cum_portfolio.last().copied().unwrap_or(1.0), n),
        btc_cagr: Stats::cagr(cum_btc.last().copied().unwrap_or(1.0), n),
        portfolio_sharpe: Stats::sharpe_ratio(&portfolio, true),
        btc_sharpe: Stats::sharpe_ratio(&btc, true),
        portfolio_mdd: Stats::max_drawdown(&cum_portfolio),
        btc_mdd: Stats::max_drawdown(&cum_btc),
        win_rate: share(portfolio.iter().filter(|r| **r > 0.0).count()),
        outperform_rate: share(
            portfolio
                .iter()
                .zip(&btc)
                .filter(|(p, b)| p > b)
                .count(),
        ),
    }
}

/// Allocation on the most recent date, non-zero weights only, largest first.
pub fn latest_recommendations(
    panel: &FeaturePanel<'_>,
    config: &OptimizationConfig,
) -> Result<Vec<Recommendation>, OptimizationError> {
    let Some(&date) = panel.by_date.keys().next_back() else {
        return Ok(Vec::new());
    };

    let mut recommendations: Vec<Recommendation> = panel
        .allocate(date, config)?
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|(signal, weight)| Recommendation {
            asset: signal.asset,
            date,
            weight,
            exp_ret: signal.exp_ret,
            exp_vol: signal.exp_vol,
            sharpe: signal.sharpe,
        })
        .collect();
    recommendations.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.asset.cmp(&b.asset))
    });
    Ok(recommendations)
}
