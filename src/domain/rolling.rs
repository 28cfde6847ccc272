//! Rolling-window backtest of the optimized portfolio.
//!
//! For each price row `i >= LOOKBACK_WINDOW` the optimizer sees only rows
//! `[i - LOOKBACK_WINDOW, i)`; the resulting weights (dated at row `i - 1`)
//! are applied to the returns realized at row `i`. Windows share no state, so they may run
//! on a rayon pool; results are merged by window index either way.

use crate::domain::cache::{WindowCache, WindowKey};
use crate::domain::error::FolioError;
use crate::domain::optimizer::{OptimizationError, WindowOptimizer};
use crate::domain::series::{
    DatedSeries, LOOKBACK_WINDOW, PriceSeries, ReturnSeries, WeightHistory, WeightVector,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub const OPTIMAL_NAME: &str = "Optimal";

/// What to do when a single window cannot be optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole backtest at the first failing window.
    #[default]
    FailFast,
    /// Omit the window's date from both output series and continue.
    SkipWindow,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RollingConfig {
    pub failure_policy: FailurePolicy,
    /// Evaluate windows on the rayon pool.
    pub parallel: bool,
}

/// Cooperative cancellation, checked between windows.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingResult {
    pub returns: DatedSeries,
    pub weights: WeightHistory,
    /// Return dates dropped under [`FailurePolicy::SkipWindow`].
    pub skipped: Vec<NaiveDate>,
}

enum Slot {
    Done(WeightVector, f64),
    Failed(OptimizationError),
    Cancelled,
}

pub struct RollingBacktestEngine<O> {
    optimizer: O,
    config: RollingConfig,
    cache: Option<Arc<WindowCache>>,
}

impl<O: WindowOptimizer> RollingBacktestEngine<O> {
    pub fn new(optimizer: O, config: RollingConfig) -> Self {
        Self {
            optimizer,
            config,
            cache: None,
        }
    }

    /// The cache must belong to this engine's optimizer configuration.
    pub fn with_cache(mut self, cache: Arc<WindowCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs every window. Fewer than `LOOKBACK_WINDOW + 1` price rows yields
    /// empty output rather than an error.
    pub fn run(
        &self,
        prices: &PriceSeries,
        returns: &ReturnSeries,
        cancel: &CancellationToken,
    ) -> Result<RollingResult, FolioError> {
        if returns.len() + 1 != prices.len() && !(prices.is_empty() && returns.is_empty()) {
            return Err(FolioError::InvalidSeries {
                reason: format!(
                    "{} return rows do not follow {} price rows",
                    returns.len(),
                    prices.len()
                ),
            });
        }

        let lookback = LOOKBACK_WINDOW;
        let windows = prices.len().saturating_sub(lookback);
        info!(
            windows,
            lookback,
            parallel = self.config.parallel,
            "starting rolling backtest"
        );

        let slots: Vec<Slot> = if self.config.parallel {
            (0..windows)
                .into_par_iter()
                .map(|k| {
                    if cancel.is_cancelled() {
                        Slot::Cancelled
                    } else {
                        self.evaluate(prices, returns, lookback + k)
                    }
                })
                .collect()
        } else {
            let mut slots = Vec::with_capacity(windows);
            for k in 0..windows {
                if cancel.is_cancelled() {
                    slots.push(Slot::Cancelled);
                    break;
                }
                let slot = self.evaluate(prices, returns, lookback + k);
                let stop = matches!(slot, Slot::Failed(_))
                    && self.config.failure_policy == FailurePolicy::FailFast;
                slots.push(slot);
                if stop {
                    break;
                }
            }
            slots
        };

        self.finalize(prices, slots)
    }

    fn evaluate(&self, prices: &PriceSeries, returns: &ReturnSeries, i: usize) -> Slot {
        let window = prices.window(i - LOOKBACK_WINDOW, i);
        let key = self.cache.as_ref().and_then(|_| WindowKey::for_window(&window));

        let cached = match (&self.cache, &key) {
            (Some(cache), Some(key)) => cache.get(key),
            _ => None,
        };

        let weights = match cached {
            Some(weights) => weights,
            None => match self.optimizer.optimize(&window) {
                Ok(weights) => {
                    if let (Some(cache), Some(key)) = (&self.cache, key) {
                        cache.insert(key, weights.clone());
                    }
                    weights
                }
                Err(e) => return Slot::Failed(e),
            },
        };

        let realized = realize(&weights, returns, i - 1);
        debug!(date = %prices.dates()[i], realized, "window optimized");
        Slot::Done(weights, realized)
    }

    fn finalize(
        &self,
        prices: &PriceSeries,
        slots: Vec<Slot>,
    ) -> Result<RollingResult, FolioError> {
        let lookback = LOOKBACK_WINDOW;
        let mut dates = Vec::with_capacity(slots.len());
        let mut values = Vec::with_capacity(slots.len());
        let mut rows = Vec::with_capacity(slots.len());
        let mut skipped = Vec::new();

        for (k, slot) in slots.into_iter().enumerate() {
            let i = lookback + k;
            match slot {
                Slot::Done(weights, realized) => {
                    dates.push(prices.dates()[i]);
                    values.push(realized);
                    rows.push(weights);
                }
                Slot::Failed(source) => {
                    let window_end = prices.dates()[i - 1];
                    match self.config.failure_policy {
                        FailurePolicy::FailFast => {
                            return Err(FolioError::OptimizationFailure { window_end, source });
                        }
                        FailurePolicy::SkipWindow => {
                            warn!(%window_end, error = %source, "skipping window");
                            skipped.push(prices.dates()[i]);
                        }
                    }
                }
                Slot::Cancelled => {
                    return Err(FolioError::Cancelled { completed: rows.len() });
                }
            }
        }

        info!(
            produced = rows.len(),
            skipped = skipped.len(),
            "rolling backtest complete"
        );

        Ok(RollingResult {
            returns: DatedSeries::new(OPTIMAL_NAME, dates, values),
            weights: WeightHistory {
                tickers: prices.tickers().to_vec(),
                rows,
            },
            skipped,
        })
    }
}

/// `Σ weight × return` over tickers present in both; unmatched tickers on
/// either side contribute nothing.
fn realize(weights: &WeightVector, returns: &ReturnSeries, row: usize) -> f64 {
    weights
        .weights
        .iter()
        .filter_map(|(ticker, w)| returns.column_by_ticker(ticker).map(|c| w * c[row]))
        .sum()
}
