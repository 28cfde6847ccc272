//! Date-indexed price, return, and weight tables.
//!
//! All tables are column-major: one `Vec<f64>` per ticker, sharing a single
//! strictly increasing date index. Missing return observations are `NaN`.

use crate::domain::error::FolioError;
use crate::domain::universe::missing_tickers;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Trailing sample length used for each optimization (one trading year).
pub const LOOKBACK_WINDOW: usize = 252;

/// Annualization constant for daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calendar days fetched ahead of the requested start so the first
/// backtest date already has a full lookback window.
pub const HISTORY_EXTENSION_DAYS: i64 = 365;

fn validate_table(
    dates: &[NaiveDate],
    tickers: &[String],
    columns: &[Vec<f64>],
) -> Result<(), FolioError> {
    if tickers.is_empty() {
        return Err(FolioError::InvalidSeries {
            reason: "at least one ticker is required".into(),
        });
    }
    if tickers.len() != columns.len() {
        return Err(FolioError::InvalidSeries {
            reason: format!(
                "{} tickers but {} columns",
                tickers.len(),
                columns.len()
            ),
        });
    }
    let mut seen = HashSet::new();
    for ticker in tickers {
        if !seen.insert(ticker.as_str()) {
            return Err(FolioError::InvalidSeries {
                reason: format!("duplicate ticker {ticker}"),
            });
        }
    }
    for (ticker, column) in tickers.iter().zip(columns) {
        if column.len() != dates.len() {
            return Err(FolioError::InvalidSeries {
                reason: format!(
                    "column {ticker} has {} values for {} dates",
                    column.len(),
                    dates.len()
                ),
            });
        }
    }
    if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(FolioError::InvalidSeries {
            reason: format!("dates not strictly increasing at {}", pair[1]),
        });
    }
    Ok(())
}

fn slice_columns(columns: &[Vec<f64>], start: usize, end: usize) -> Vec<Vec<f64>> {
    columns.iter().map(|c| c[start..end].to_vec()).collect()
}

/// Adjusted closing prices, one column per ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceSeries {
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, FolioError> {
        validate_table(&dates, &tickers, &columns)?;
        for (ticker, column) in tickers.iter().zip(&columns) {
            if let Some(bad) = column.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
                return Err(FolioError::InvalidSeries {
                    reason: format!("non-positive price {bad} for {ticker}"),
                });
            }
        }
        Ok(Self {
            dates,
            tickers,
            columns,
        })
    }

    /// Aligns per-ticker `(date, price)` lists on the dates every ticker shares.
    ///
    /// Tickers with no rows at all are reported together as a mismatched universe.
    pub fn from_ticker_series(
        tickers: &[String],
        series: &HashMap<String, Vec<(NaiveDate, f64)>>,
    ) -> Result<Self, FolioError> {
        if tickers.is_empty() {
            return Err(FolioError::InvalidSeries {
                reason: "at least one ticker is required".into(),
            });
        }
        let available: Vec<String> = series
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(ticker, _)| ticker.clone())
            .collect();
        let missing = missing_tickers(tickers, &available);
        if !missing.is_empty() {
            return Err(FolioError::MismatchedUniverse { tickers: missing });
        }

        let lookups: Vec<HashMap<NaiveDate, f64>> = tickers
            .iter()
            .map(|t| series[t].iter().copied().collect())
            .collect();

        let mut common: BTreeSet<NaiveDate> = lookups[0].keys().copied().collect();
        for lookup in &lookups[1..] {
            common.retain(|d| lookup.contains_key(d));
        }
        let dates: Vec<NaiveDate> = common.into_iter().collect();

        let columns = lookups
            .iter()
            .map(|lookup| dates.iter().map(|d| lookup[d]).collect())
            .collect();

        Self::new(dates, tickers.to_vec(), columns)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Rows `[start, end)`; the caller guarantees `start <= end <= len()`.
    pub fn window(&self, start: usize, end: usize) -> PriceSeries {
        PriceSeries {
            dates: self.dates[start..end].to_vec(),
            tickers: self.tickers.clone(),
            columns: slice_columns(&self.columns, start, end),
        }
    }

    /// Simple period-over-period change `p[t] / p[t-1] - 1`; the first row has
    /// no prior price and is dropped.
    pub fn returns(&self) -> ReturnSeries {
        let dates = self.dates.iter().skip(1).copied().collect();
        let columns = self
            .columns
            .iter()
            .map(|c| c.windows(2).map(|w| w[1] / w[0] - 1.0).collect())
            .collect();
        ReturnSeries {
            dates,
            tickers: self.tickers.clone(),
            columns,
        }
    }
}

/// Simple daily returns, one column per ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ReturnSeries {
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, FolioError> {
        validate_table(&dates, &tickers, &columns)?;
        Ok(Self {
            dates,
            tickers,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn column_by_ticker(&self, ticker: &str) -> Option<&[f64]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    /// Cross-section of all tickers at row `index`, in ticker order.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    /// Rows dated on or after `date`.
    pub fn since(&self, date: NaiveDate) -> ReturnSeries {
        let start = self.dates.partition_point(|d| *d < date);
        ReturnSeries {
            dates: self.dates[start..].to_vec(),
            tickers: self.tickers.clone(),
            columns: slice_columns(&self.columns, start, self.dates.len()),
        }
    }
}

/// A single named, date-indexed return series (a portfolio's daily returns).
#[derive(Debug, Clone, PartialEq)]
pub struct DatedSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl DatedSeries {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dates,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    pub fn since(&self, date: NaiveDate) -> DatedSeries {
        let start = self.dates.partition_point(|d| *d < date);
        DatedSeries {
            name: self.name.clone(),
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }
}

/// Portfolio weights for one rebalancing date, in input ticker order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    pub date: NaiveDate,
    pub weights: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, w)| *w)
    }

    pub fn sum(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }
}

/// Weight vectors ordered by rebalancing date.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightHistory {
    pub tickers: Vec<String>,
    pub rows: Vec<WeightVector>,
}

impl WeightHistory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn since(&self, date: NaiveDate) -> WeightHistory {
        WeightHistory {
            tickers: self.tickers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.date >= date)
                .cloned()
                .collect(),
        }
    }
}
