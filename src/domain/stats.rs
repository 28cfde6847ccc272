//! Per-series risk/return summary.
//!
//! Rows come out in input column order. Missing (`NaN`) observations are
//! skipped, and the Sharpe ratio is left non-finite when volatility is zero.

use crate::domain::drawdown::max_drawdown;
use crate::domain::series::{DatedSeries, ReturnSeries, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub name: String,
    pub observations: usize,
    /// Simple sum of period returns (not compounded).
    pub cumulative_return: f64,
    pub mean_daily_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl StatsRow {
    pub fn compute(name: &str, values: &[f64]) -> Self {
        let usable: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let observations = usable.len();
        let cumulative_return: f64 = usable.iter().sum();
        let mean_daily_return = cumulative_return / observations as f64;
        let annualized_volatility = sample_stddev(&usable) * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe_ratio = mean_daily_return * TRADING_DAYS_PER_YEAR / annualized_volatility;

        StatsRow {
            name: name.to_string(),
            observations,
            cumulative_return,
            mean_daily_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown: max_drawdown(&usable),
        }
    }
}

/// Sample standard deviation (n - 1 denominator). Identical observations give
/// exactly zero, so rounding in the mean cannot fake a tiny volatility.
fn sample_stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    if values.iter().all(|v| *v == values[0]) {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// One row per ticker column.
pub fn summarize(table: &ReturnSeries) -> Vec<StatsRow> {
    table
        .tickers()
        .iter()
        .enumerate()
        .map(|(i, ticker)| StatsRow::compute(ticker, table.column(i)))
        .collect()
}

/// One row per portfolio series.
pub fn summarize_series(series: &[DatedSeries]) -> Vec<StatsRow> {
    series
        .iter()
        .map(|s| StatsRow::compute(&s.name, &s.values))
        .collect()
}
