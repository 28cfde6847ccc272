//! Static equal-weight portfolio.

use crate::domain::series::{DatedSeries, LOOKBACK_WINDOW, ReturnSeries};

pub const EQUAL_WEIGHT_NAME: &str = "Equal Weight";

/// Cross-sectional mean of asset returns, starting on the same date as the
/// first optimized return (price row `LOOKBACK_WINDOW`). Missing observations
/// are skipped; a row with none left is `NaN`.
pub fn equal_weight_returns(returns: &ReturnSeries) -> DatedSeries {
    // Return row i is dated at price row i + 1.
    let first = (LOOKBACK_WINDOW - 1).min(returns.len());
    let dates = returns.dates()[first..].to_vec();
    let values = (first..returns.len())
        .map(|i| row_mean(&returns.row(i)))
        .collect();
    DatedSeries::new(EQUAL_WEIGHT_NAME, dates, values)
}

fn row_mean(row: &[f64]) -> f64 {
    let (sum, count) = row
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
