use crate::application::features::sentiment::DailySentiment;
use crate::domain::performance::Stats;
use crate::domain::types::{FeatureRow, MarketBar};
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

/// Days of history needed before an asset yields its first row.
pub const MIN_HISTORY_DAYS: usize = 30;
const RSI_PERIOD: usize = 14;

/// Computes the feature rows of one asset.
///
/// `bars` must be sorted by date with one bar per day. The first row is
/// emitted on day `MIN_HISTORY_DAYS`, once 30-day momentum and volatility are
/// defined; shorter histories yield nothing.
pub fn asset_features(
    symbol: &str,
    bars: &[MarketBar],
    sentiment: &DailySentiment,
) -> Result<Vec<FeatureRow>, String> {
    if bars.len() <= MIN_HISTORY_DAYS {
        return Ok(Vec::new());
    }

    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let returns = Stats::calculate_returns(&closes);
    if returns.len() != closes.len() - 1 {
        return Err(format!("{} has non-positive closes", symbol));
    }

    let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).map_err(|e| e.to_string())?;
    let mut rows = Vec::with_capacity(bars.len() - MIN_HISTORY_DAYS);

    for (i, bar) in bars.iter().enumerate() {
        let rsi_14 = rsi.next(bar.close);
        if i < MIN_HISTORY_DAYS {
            continue;
        }

        let (news_count, mean_sentiment) = sentiment.get(symbol, bar.date);
        let row = FeatureRow {
            date: bar.date,
            asset: symbol.to_string(),
            close: bar.close,
            ret_1d: returns[i - 1],
            mom_7d: closes[i] / closes[i - 7] - 1.0,
            mom_30d: closes[i] / closes[i - 30] - 1.0,
            vol_30d: Stats::std_dev(&returns[i - 30..i]),
            rsi_14,
            news_count,
            sentiment: mean_sentiment,
        };

        if let Some(field) = row.non_finite_field() {
            return Err(format!("{} on {} has non-finite {}", symbol, bar.date, field));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(closes: &[f64]) -> Vec<MarketBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| MarketBar {
                date: start + Duration::days(i as i64),
                symbol: "ETH".to_string(),
                rank: 2,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_short_history_yields_no_rows() {
        let closes = vec![100.0; MIN_HISTORY_DAYS];
        let rows = asset_features("ETH", &bars(&closes), &DailySentiment::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_momentum_and_volatility() {
        // Steady 1% daily growth
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let rows = asset_features("ETH", &bars(&closes), &DailySentiment::default()).unwrap();

        assert_eq!(rows.len(), 10);
        let first = &rows[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!((first.ret_1d - 0.01).abs() < 1e-9);
        assert!((first.mom_7d - (1.01_f64.powi(7) - 1.0)).abs() < 1e-9);
        assert!((first.mom_30d - (1.01_f64.powi(30) - 1.0)).abs() < 1e-9);
        assert!(first.vol_30d.abs() < 1e-9);
        assert!(first.rsi_14 > 90.0);
        assert_eq!(first.news_count, 0);
        assert_eq!(first.sentiment, 0.0);
    }

    #[test]
    fn test_non_positive_close_is_rejected() {
        let mut closes = vec![100.0; 40];
        closes[10] = 0.0;
        assert!(asset_features("ETH", &bars(&closes), &DailySentiment::default()).is_err());
    }
}
