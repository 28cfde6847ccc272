//! CSV report adapter implementing ReportPort.
//!
//! Writes four files into the output directory with raw, unformatted numbers:
//! `asset_stats.csv`, `portfolio_stats.csv`, `portfolio_returns.csv` and
//! `weights.csv`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::FolioError;
use crate::domain::stats::StatsRow;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use tracing::info;

pub const ASSET_STATS_FILE: &str = "asset_stats.csv";
pub const PORTFOLIO_STATS_FILE: &str = "portfolio_stats.csv";
pub const PORTFOLIO_RETURNS_FILE: &str = "portfolio_returns.csv";
pub const WEIGHTS_FILE: &str = "weights.csv";

const STATS_HEADER: [&str; 7] = [
    "name",
    "observations",
    "cumulative_return",
    "mean_daily_return",
    "annualized_volatility",
    "sharpe_ratio",
    "max_drawdown",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(path: &Path, e: csv::Error) -> FolioError {
    FolioError::Io(std::io::Error::other(format!(
        "failed to write {}: {}",
        path.display(),
        e
    )))
}

fn open_writer(path: &Path) -> Result<csv::Writer<fs::File>, FolioError> {
    csv::Writer::from_path(path).map_err(|e| csv_error(path, e))
}

fn write_record<I, S>(
    writer: &mut csv::Writer<fs::File>,
    path: &Path,
    record: I,
) -> Result<(), FolioError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    writer.write_record(record).map_err(|e| csv_error(path, e))
}

fn write_stats(path: &Path, rows: &[StatsRow]) -> Result<(), FolioError> {
    let mut writer = open_writer(path)?;
    write_record(&mut writer, path, STATS_HEADER)?;
    for row in rows {
        write_record(
            &mut writer,
            path,
            [
                row.name.clone(),
                row.observations.to_string(),
                row.cumulative_return.to_string(),
                row.mean_daily_return.to_string(),
                row.annualized_volatility.to_string(),
                row.sharpe_ratio.to_string(),
                row.max_drawdown.to_string(),
            ],
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Both portfolio series side by side over the union of their dates; a day
/// missing from one series leaves its cell empty.
fn write_portfolio_returns(path: &Path, report: &AnalysisReport) -> Result<(), FolioError> {
    let mut writer = open_writer(path)?;
    write_record(
        &mut writer,
        path,
        [
            "date",
            report.equal_weight.name.as_str(),
            report.optimized.name.as_str(),
        ],
    )?;

    let dates: BTreeSet<NaiveDate> = report
        .equal_weight
        .dates
        .iter()
        .chain(&report.optimized.dates)
        .copied()
        .collect();
    for date in dates {
        write_record(
            &mut writer,
            path,
            [
                date.to_string(),
                cell(report.equal_weight.get(date)),
                cell(report.optimized.get(date)),
            ],
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn write_weights(path: &Path, report: &AnalysisReport) -> Result<(), FolioError> {
    let mut writer = open_writer(path)?;
    let header = std::iter::once("date").chain(report.weights.tickers.iter().map(String::as_str));
    write_record(&mut writer, path, header)?;

    for row in &report.weights.rows {
        let record = std::iter::once(row.date.to_string())
            .chain(report.weights.tickers.iter().map(|t| cell(row.get(t))));
        write_record(&mut writer, path, record)?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &AnalysisReport, output_dir: &Path) -> Result<(), FolioError> {
        fs::create_dir_all(output_dir)?;

        write_stats(&output_dir.join(ASSET_STATS_FILE), &report.asset_stats)?;
        write_stats(
            &output_dir.join(PORTFOLIO_STATS_FILE),
            &report.portfolio_stats,
        )?;
        write_portfolio_returns(&output_dir.join(PORTFOLIO_RETURNS_FILE), report)?;
        write_weights(&output_dir.join(WEIGHTS_FILE), report)?;

        info!(dir = %output_dir.display(), "report written");
        Ok(())
    }
}
