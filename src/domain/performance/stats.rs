use statrs::statistics::Statistics;

/// Crypto markets trade every day of the year.
pub const PERIODS_PER_YEAR: f64 = 365.0;

/// Shared statistics utilities for backtest reporting.
pub struct Stats;

impl Stats {
    /// Calculate the Sharpe ratio of periodic returns.
    ///
    /// Uses the sample standard deviation; annualized with
    /// `sqrt(PERIODS_PER_YEAR)` when `annualize` is set.
    pub fn sharpe_ratio(returns: &[f64], annualize: bool) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if !std_dev.is_finite() || std_dev <= 1e-12 {
            return 0.0;
        }

        let ratio = mean / std_dev;
        if annualize {
            ratio * PERIODS_PER_YEAR.sqrt()
        } else {
            ratio
        }
    }

    /// Sample standard deviation, zero for fewer than two points.
    pub fn std_dev(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        values.iter().std_dev()
    }

    /// Growth of one unit compounded through `returns`.
    pub fn cumulative(returns: &[f64]) -> Vec<f64> {
        returns
            .iter()
            .scan(1.0, |growth, r| {
                *growth *= 1.0 + r;
                Some(*growth)
            })
            .collect()
    }

    /// Compound annual growth rate given the final growth factor after `periods` days.
    pub fn cagr(final_growth: f64, periods: usize) -> f64 {
        if periods == 0 {
            return 0.0;
        }
        if final_growth <= 0.0 {
            return -1.0;
        }
        final_growth.powf(PERIODS_PER_YEAR / periods as f64) - 1.0
    }

    /// Drawdown from the running peak for each point of a growth curve (<= 0).
    pub fn drawdowns(growth: &[f64]) -> Vec<f64> {
        let mut peak = 1.0_f64;
        growth
            .iter()
            .map(|&value| {
                peak = peak.max(value);
                if peak > 0.0 { value / peak - 1.0 } else { 0.0 }
            })
            .collect()
    }

    /// Most negative drawdown, zero for a curve that never declines.
    pub fn max_drawdown(growth: &[f64]) -> f64 {
        Self::drawdowns(growth)
            .into_iter()
            .fold(0.0_f64, f64::min)
    }

    pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
        prices
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| w[1] / w[0] - 1.0)
            .collect()
    }
}
