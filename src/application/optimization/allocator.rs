//! Long-only mean-variance allocation with a diagonal covariance.
//!
//! Maximizes `mu'w - (gamma/2) * sum(sigma_i^2 * w_i^2)` subject to
//! `sum(w) = 1`, `w >= 0`. With a diagonal covariance the KKT conditions give
//! `w_i = max(0, (mu_i - lambda) / (gamma * sigma_i^2))`, and the budget
//! multiplier `lambda` is found by bisection.

use crate::domain::errors::OptimizationError;
use crate::domain::types::FeatureRow;
use chrono::NaiveDate;
use std::cmp::Ordering;

const ANNUALIZATION_DAYS: f64 = 365.0;
const SENTIMENT_TILT: f64 = 0.5;
const BISECTION_ITERATIONS: usize = 200;
const BUDGET_TOLERANCE: f64 = 1e-6;

/// Annualized return/risk estimate for one asset on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSignal {
    pub asset: String,
    pub exp_ret: f64,
    pub exp_vol: f64,
    pub sharpe: f64,
}

impl AssetSignal {
    pub fn from_row(row: &FeatureRow) -> Self {
        let exp_ret =
            ANNUALIZATION_DAYS * (row.mom_30d / 30.0) * (1.0 + SENTIMENT_TILT * row.sentiment);
        let exp_vol = row.vol_30d * ANNUALIZATION_DAYS.sqrt();
        let sharpe = if exp_vol > 0.0 { exp_ret / exp_vol } else { 0.0 };
        Self {
            asset: row.asset.clone(),
            exp_ret,
            exp_vol,
            sharpe,
        }
    }
}

/// Top `cap` assets by Sharpe among those with positive volatility.
/// Ties are broken by asset name.
pub fn select_candidates(signals: Vec<AssetSignal>, cap: usize) -> Vec<AssetSignal> {
    let mut candidates: Vec<AssetSignal> = signals
        .into_iter()
        .filter(|s| s.exp_vol > 0.0 && s.exp_vol.is_finite() && s.sharpe.is_finite())
        .collect();
    candidates.sort_by(|a, b| {
        b.sharpe
            .partial_cmp(&a.sharpe)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.asset.cmp(&b.asset))
    });
    candidates.truncate(cap);
    candidates
}

fn weights_at(candidates: &[AssetSignal], gamma: f64, lambda: f64) -> Vec<f64> {
    candidates
        .iter()
        .map(|c| ((c.exp_ret - lambda) / (gamma * c.exp_vol * c.exp_vol)).max(0.0))
        .collect()
}

/// Solves the allocation for `candidates`; weights are returned in the same order.
pub fn mean_variance_weights(
    candidates: &[AssetSignal],
    gamma: f64,
    date: NaiveDate,
) -> Result<Vec<f64>, OptimizationError> {
    if candidates.is_empty() {
        return Err(OptimizationError::Infeasible {
            date: date.to_string(),
            reason: "no asset has positive expected volatility".to_string(),
        });
    }

    // At `lo` every weight is at least 1, at `hi` every weight is 0
    let mut lo = candidates
        .iter()
        .map(|c| c.exp_ret - gamma * c.exp_vol * c.exp_vol)
        .fold(f64::INFINITY, f64::min);
    let mut hi = candidates
        .iter()
        .map(|c| c.exp_ret)
        .fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Err(OptimizationError::Infeasible {
            date: date.to_string(),
            reason: "non-finite return or volatility estimate".to_string(),
        });
    }

    for _ in 0..BISECTION_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let total: f64 = weights_at(candidates, gamma, mid).iter().sum();
        if total > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let mut weights = weights_at(candidates, gamma, 0.5 * (lo + hi));
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        weights.iter_mut().for_each(|w| *w /= total);
    }

    let sum: f64 = weights.iter().sum();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || (sum - 1.0).abs() > BUDGET_TOLERANCE {
        return Err(OptimizationError::InvalidAllocation {
            date: date.to_string(),
            sum,
        });
    }
    Ok(weights)
}
