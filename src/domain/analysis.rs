//! End-to-end analysis: prices in, the four presentation products out.

use crate::domain::equal_weight::equal_weight_returns;
use crate::domain::error::FolioError;
use crate::domain::optimizer::{MeanVarianceOptimizer, OptimizerConfig};
use crate::domain::rolling::{CancellationToken, RollingBacktestEngine, RollingConfig};
use crate::domain::series::{
    DatedSeries, HISTORY_EXTENSION_DAYS, LOOKBACK_WINDOW, PriceSeries, WeightHistory,
};
use crate::domain::stats::{StatsRow, summarize, summarize_series};
use crate::ports::data_port::PriceDataPort;
use chrono::{Duration, NaiveDate};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AnalysisRequest {
    /// First date requested from the data source: one year before
    /// `start_date`, so the first reported day has a full lookback window.
    pub fn fetch_start(&self) -> NaiveDate {
        self.start_date - Duration::days(HISTORY_EXTENSION_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisSettings {
    pub optimizer: OptimizerConfig,
    pub rolling: RollingConfig,
}

/// Everything the presentation layer needs, unformatted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub asset_stats: Vec<StatsRow>,
    pub portfolio_stats: Vec<StatsRow>,
    pub equal_weight: DatedSeries,
    pub optimized: DatedSeries,
    pub weights: WeightHistory,
    pub skipped: Vec<NaiveDate>,
}

pub fn run_analysis(
    data_port: &dyn PriceDataPort,
    request: &AnalysisRequest,
    settings: &AnalysisSettings,
    cancel: &CancellationToken,
) -> Result<AnalysisReport, FolioError> {
    info!(
        tickers = request.tickers.len(),
        from = %request.fetch_start(),
        to = %request.end_date,
        "fetching prices"
    );
    let prices = data_port.fetch_prices(&request.tickers, request.fetch_start(), request.end_date)?;
    analyze_prices(&prices, request.start_date, settings, cancel)
}

/// Runs the backtest on an already-fetched price table and trims every
/// product to dates on or after `report_start`.
pub fn analyze_prices(
    prices: &PriceSeries,
    report_start: NaiveDate,
    settings: &AnalysisSettings,
    cancel: &CancellationToken,
) -> Result<AnalysisReport, FolioError> {
    let minimum = LOOKBACK_WINDOW + 1;
    if prices.len() < minimum {
        return Err(FolioError::InsufficientData {
            rows: prices.len(),
            minimum,
        });
    }

    let returns = prices.returns();
    let equal_weight = equal_weight_returns(&returns);

    let engine = RollingBacktestEngine::new(
        MeanVarianceOptimizer::new(settings.optimizer.clone()),
        settings.rolling.clone(),
    );
    let rolling = engine.run(prices, &returns, cancel)?;

    let asset_returns = returns.since(report_start);
    let equal_weight = equal_weight.since(report_start);
    let optimized = rolling.returns.since(report_start);
    let weights = rolling.weights.since(report_start);

    let asset_stats = summarize(&asset_returns);
    let portfolio_stats = summarize_series(&[
        align_to(&equal_weight, &optimized),
        optimized.clone(),
    ]);

    info!(
        assets = asset_stats.len(),
        days = optimized.len(),
        skipped = rolling.skipped.len(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        asset_stats,
        portfolio_stats,
        equal_weight,
        optimized,
        weights,
        skipped: rolling.skipped,
    })
}

/// Restricts `series` to the dates present in `reference`, so both portfolios
/// are summarized over the same days.
fn align_to(series: &DatedSeries, reference: &DatedSeries) -> DatedSeries {
    let (dates, values) = series
        .dates
        .iter()
        .zip(&series.values)
        .filter(|(d, _)| reference.dates.binary_search(d).is_ok())
        .map(|(d, v)| (*d, *v))
        .unzip();
    DatedSeries::new(series.name.clone(), dates, values)
}
