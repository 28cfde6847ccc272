#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use folio::domain::error::FolioError;
use folio::domain::series::PriceSeries;
use folio::ports::data_port::PriceDataPort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockPriceDataPort {
    pub data: HashMap<String, Vec<(NaiveDate, f64)>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, ticker: &str, dates: &[NaiveDate], prices: &[f64]) -> Self {
        let rows = dates.iter().copied().zip(prices.iter().copied()).collect();
        self.data.insert(ticker.to_string(), rows);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn fetch_ticker(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FolioError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(FolioError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|rows| {
                rows.iter()
                    .copied()
                    .filter(|(d, _)| *d >= start_date && *d <= end_date)
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting at (or after) `start`.
pub fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut day = start;
    while dates.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(day);
        }
        day += Duration::days(1);
    }
    dates
}

/// Linear ramp `start, start + step, ...`.
pub fn ramp(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Deterministic wavy path: compounding drift with a sinusoidal wobble.
pub fn wavy(start: f64, drift: f64, amplitude: f64, period: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            start
                * (1.0 + drift).powf(t)
                * (1.0 + amplitude * (2.0 * std::f64::consts::PI * t / period).sin())
        })
        .collect()
}

pub fn price_table(dates: Vec<NaiveDate>, columns: Vec<(&str, Vec<f64>)>) -> PriceSeries {
    let (tickers, columns): (Vec<String>, Vec<Vec<f64>>) = columns
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .unzip();
    PriceSeries::new(dates, tickers, columns).unwrap()
}

/// Writes `<dir>/<ticker>.csv` with a `date,adj_close` header.
pub fn write_price_csv(dir: &Path, ticker: &str, dates: &[NaiveDate], prices: &[f64]) {
    let mut content = String::from("date,adj_close\n");
    for (d, p) in dates.iter().zip(prices) {
        content.push_str(&format!("{},{}\n", d, p));
    }
    fs::write(dir.join(format!("{}.csv", ticker)), content).unwrap();
}
