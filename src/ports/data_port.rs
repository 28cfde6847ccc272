//! Historical price source port.

use crate::domain::error::FolioError;
use crate::domain::series::PriceSeries;
use chrono::NaiveDate;
use std::collections::HashMap;

pub trait PriceDataPort {
    /// Adjusted closes for one ticker within `[start_date, end_date]`. An
    /// unknown ticker yields an empty list, not an error.
    fn fetch_ticker(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FolioError>;

    /// All tickers aligned on their shared dates.
    fn fetch_prices(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FolioError> {
        let mut series = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            let rows = self.fetch_ticker(ticker, start_date, end_date)?;
            series.insert(ticker.clone(), rows);
        }
        PriceSeries::from_ticker_series(tickers, &series)
    }
}
