//! CSV price directory adapter: one `<TICKER>.csv` file per ticker.

use crate::domain::error::FolioError;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

const CLOSE_HEADERS: [&str; 3] = ["adj_close", "adj close", "adjclose"];

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

/// Index of the adjusted close column, or the last column when no header
/// matches.
fn close_column(headers: &csv::StringRecord) -> Option<usize> {
    headers
        .iter()
        .position(|h| CLOSE_HEADERS.contains(&h.trim().to_ascii_lowercase().as_str()))
        .or_else(|| headers.len().checked_sub(1))
        .filter(|&i| i > 0)
}

impl PriceDataPort for CsvPriceAdapter {
    fn fetch_ticker(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FolioError> {
        let path = self.csv_path(ticker);
        let mut rdr = match csv::Reader::from_path(&path) {
            Ok(rdr) => rdr,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind() {
                    if io.kind() == ErrorKind::NotFound {
                        debug!(ticker, path = %path.display(), "no price file");
                        return Ok(Vec::new());
                    }
                }
                return Err(FolioError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let headers = rdr.headers().map_err(|e| FolioError::DataSource {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let close_idx = close_column(headers).ok_or_else(|| FolioError::DataSource {
            reason: format!("{}: expected a date column and a price column", path.display()),
        })?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| FolioError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| FolioError::DataSource {
                reason: format!("{}: missing date column", path.display()),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                FolioError::DataSource {
                    reason: format!("{}: invalid date '{}': {}", path.display(), date_str, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let raw = record.get(close_idx).map(str::trim).unwrap_or("");
            if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
                debug!(ticker, %date, "skipping row without a price");
                continue;
            }
            let price: f64 = raw.parse().map_err(|e| FolioError::DataSource {
                reason: format!("{}: invalid price '{}' on {}: {}", path.display(), raw, date, e),
            })?;
            rows.push((date, price));
        }

        rows.sort_by_key(|(date, _)| *date);
        debug!(ticker, rows = rows.len(), "loaded prices");
        Ok(rows)
    }
}
