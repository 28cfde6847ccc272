//! End-to-end analysis tests with a mock price port (no files).
//!
//! Tests cover:
//! - Full pipeline: one asset rising, one flat, all weight on the riser
//! - History extension and trimming to the requested start date
//! - Lookback boundary (252 vs 253 price rows)
//! - Universe and data source failures
//! - Failure policies on windows with no positive excess return
//! - Parallel and cached runs matching the sequential run

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use folio::domain::analysis::{AnalysisRequest, AnalysisSettings, analyze_prices, run_analysis};
use folio::domain::cache::WindowCache;
use folio::domain::error::FolioError;
use folio::domain::optimizer::{
    ExpectedReturns, MeanVarianceOptimizer, OptimizationError, OptimizerConfig,
};
use folio::domain::rolling::{
    CancellationToken, FailurePolicy, RollingBacktestEngine, RollingConfig,
};
use folio::domain::series::PriceSeries;
use std::sync::Arc;

const DAYS: usize = 260;

fn rising_and_flat() -> MockPriceDataPort {
    let dates = weekdays(date(2023, 1, 2), DAYS);
    MockPriceDataPort::new()
        .with_prices("A", &dates, &ramp(100.0, 1.0, DAYS))
        .with_prices("B", &dates, &vec![50.0; DAYS])
}

fn request(tickers: &[&str], start_date: chrono::NaiveDate) -> AnalysisRequest {
    AnalysisRequest {
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        start_date,
        end_date: date(2024, 6, 30),
    }
}

/// Falls steadily for 256 rows, then jumps 20% a day. Windows ending before
/// the second jump have a negative compounded return.
fn decline_then_rally(n: usize, wobble_period: f64) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let fall = 0.999_f64.powi(t.min(255) as i32);
            let rally = 1.2_f64.powi(t.saturating_sub(255) as i32);
            let phase = 2.0 * std::f64::consts::PI * t as f64 / wobble_period;
            let wobble = 1.0 + 0.005 * phase.sin();
            100.0 * fall * rally * wobble
        })
        .collect()
}

fn rally_prices() -> PriceSeries {
    let n = 262;
    price_table(
        weekdays(date(2022, 1, 3), n),
        vec![
            ("A", decline_then_rally(n, 7.0)),
            ("B", decline_then_rally(n, 11.0)),
        ],
    )
}

fn wavy_prices(n: usize) -> PriceSeries {
    price_table(
        weekdays(date(2021, 1, 4), n),
        vec![
            ("NVDA", wavy(100.0, 0.0015, 0.05, 23.0, n)),
            ("XOM", wavy(80.0, 0.0008, 0.03, 17.0, n)),
            ("MO", wavy(40.0, 0.0004, 0.02, 31.0, n)),
        ],
    )
}

mod full_pipeline {
    use super::*;

    #[test]
    fn all_weight_goes_to_rising_asset() {
        let port = rising_and_flat();
        let dates = weekdays(date(2023, 1, 2), DAYS);
        let report = run_analysis(
            &port,
            &request(&["A", "B"], dates[0]),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.optimized.len(), DAYS - 252);
        assert_eq!(report.equal_weight.len(), DAYS - 252);
        assert_eq!(report.optimized.dates, report.equal_weight.dates);
        assert_eq!(report.optimized.dates[0], dates[252]);
        assert!(report.skipped.is_empty());

        for row in &report.weights.rows {
            assert_abs_diff_eq!(row.get("A").unwrap(), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(row.get("B").unwrap(), 0.0, epsilon = 1e-9);
        }

        // Optimal earns A's return; equal weight earns half of it.
        for (k, d) in report.optimized.dates.iter().enumerate() {
            let i = 252 + k;
            assert_eq!(*d, dates[i]);
            let a_return = 1.0 / (100.0 + (i - 1) as f64);
            assert_abs_diff_eq!(report.optimized.values[k], a_return, epsilon = 1e-12);
            assert_abs_diff_eq!(report.equal_weight.values[k], a_return / 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn stats_cover_assets_and_portfolios() {
        let port = rising_and_flat();
        let dates = weekdays(date(2023, 1, 2), DAYS);
        let report = run_analysis(
            &port,
            &request(&["A", "B"], dates[0]),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        let names: Vec<&str> = report.asset_stats.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(report.asset_stats[0].observations, DAYS - 1);

        // Flat asset: zero volatility, zero mean, undefined Sharpe.
        let flat = &report.asset_stats[1];
        assert_eq!(flat.annualized_volatility, 0.0);
        assert_eq!(flat.max_drawdown, 0.0);
        assert!(flat.sharpe_ratio.is_nan());

        let names: Vec<&str> = report
            .portfolio_stats
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Equal Weight", "Optimal"]);
        assert!(report.portfolio_stats[1].sharpe_ratio > 0.0);
        assert_eq!(report.portfolio_stats[1].max_drawdown, 0.0);
    }

    #[test]
    fn outputs_are_trimmed_to_start_date() {
        let port = rising_and_flat();
        let dates = weekdays(date(2023, 1, 2), DAYS);
        let start = dates[255];
        let report = run_analysis(
            &port,
            &request(&["A", "B"], start),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.optimized.len(), DAYS - 255);
        assert_eq!(report.equal_weight.len(), DAYS - 255);
        assert_eq!(report.asset_stats[0].observations, DAYS - 255);
        assert!(report.weights.dates().iter().all(|d| *d >= start));
        assert!(report.optimized.dates.iter().all(|d| *d >= start));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let prices = wavy_prices(300);
        let settings = AnalysisSettings::default();
        let start = prices.dates()[0];
        let first = analyze_prices(&prices, start, &settings, &CancellationToken::new()).unwrap();
        let second = analyze_prices(&prices, start, &settings, &CancellationToken::new()).unwrap();

        assert_eq!(first.optimized, second.optimized);
        assert_eq!(first.equal_weight, second.equal_weight);
        assert_eq!(first.weights, second.weights);
    }
}

mod lookback_boundary {
    use super::*;

    #[test]
    fn exactly_lookback_rows_is_insufficient() {
        let prices = wavy_prices(252);
        let err = analyze_prices(
            &prices,
            prices.dates()[0],
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FolioError::InsufficientData {
                rows: 252,
                minimum: 253
            }
        ));
    }

    #[test]
    fn one_extra_row_gives_one_window() {
        let prices = wavy_prices(253);
        let report = analyze_prices(
            &prices,
            prices.dates()[0],
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.optimized.len(), 1);
        assert_eq!(report.optimized.dates[0], prices.dates()[252]);
        assert_eq!(report.weights.len(), 1);
        assert_eq!(report.weights.rows[0].date, prices.dates()[251]);
        assert_abs_diff_eq!(report.weights.rows[0].sum(), 1.0, epsilon = 1e-9);
        assert_eq!(report.equal_weight.len(), 1);
    }

    #[test]
    fn short_fetch_reports_row_count() {
        let dates = weekdays(date(2023, 1, 2), 200);
        let port = MockPriceDataPort::new().with_prices("A", &dates, &ramp(10.0, 0.1, 200));
        let err = run_analysis(
            &port,
            &request(&["A"], dates[0]),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FolioError::InsufficientData {
                rows: 200,
                minimum: 253
            }
        ));
    }
}

mod universe_failures {
    use super::*;

    #[test]
    fn every_missing_ticker_is_reported() {
        let port = rising_and_flat();
        let err = run_analysis(
            &port,
            &request(&["A", "ZZZZ", "B", "QQQQ"], date(2023, 1, 2)),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        match err {
            FolioError::MismatchedUniverse { tickers } => {
                assert_eq!(tickers, vec!["ZZZZ", "QQQQ"]);
            }
            other => panic!("expected MismatchedUniverse, got {other:?}"),
        }
    }

    #[test]
    fn data_source_error_propagates() {
        let port = rising_and_flat().with_error("B", "connection reset");
        let err = run_analysis(
            &port,
            &request(&["A", "B"], date(2023, 1, 2)),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FolioError::DataSource { reason } if reason == "connection reset"));
    }

    #[test]
    fn history_before_extension_is_not_fetched() {
        // 260 rows, but the request starts late enough that the 365-day
        // extension cuts off the early rows.
        let port = rising_and_flat();
        let dates = weekdays(date(2023, 1, 2), DAYS);
        let late_start = dates[0] + chrono::Duration::days(400);
        let err = run_analysis(
            &port,
            &request(&["A", "B"], late_start),
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FolioError::InsufficientData { .. }));
    }
}

mod failure_policies {
    use super::*;

    #[test]
    fn fail_fast_names_first_failing_window() {
        let prices = rally_prices();
        let err = analyze_prices(
            &prices,
            prices.dates()[0],
            &AnalysisSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        match err {
            FolioError::OptimizationFailure { window_end, source } => {
                assert_eq!(window_end, prices.dates()[251]);
                assert!(matches!(
                    source,
                    OptimizationError::NoPositiveExcessReturn { .. }
                ));
            }
            other => panic!("expected OptimizationFailure, got {other:?}"),
        }
    }

    #[test]
    fn skip_policy_drops_failed_dates_from_both_series() {
        let prices = rally_prices();
        let settings = AnalysisSettings {
            rolling: RollingConfig {
                failure_policy: FailurePolicy::SkipWindow,
                parallel: false,
            },
            ..AnalysisSettings::default()
        };
        let start = prices.dates()[0];
        let report = analyze_prices(&prices, start, &settings, &CancellationToken::new()).unwrap();

        assert_eq!(report.skipped, prices.dates()[252..258].to_vec());
        assert_eq!(report.optimized.dates, prices.dates()[258..262].to_vec());
        assert_eq!(report.equal_weight.len(), 10);
        assert_eq!(report.portfolio_stats[0].observations, 4);
        assert_eq!(report.portfolio_stats[1].observations, 4);
    }
}

mod execution_modes {
    use super::*;

    #[test]
    fn parallel_matches_sequential() {
        let prices = wavy_prices(320);
        let sequential = AnalysisSettings::default();
        let parallel = AnalysisSettings {
            rolling: RollingConfig {
                parallel: true,
                ..RollingConfig::default()
            },
            ..AnalysisSettings::default()
        };
        let start = prices.dates()[0];
        let a = analyze_prices(&prices, start, &sequential, &CancellationToken::new()).unwrap();
        let b = analyze_prices(&prices, start, &parallel, &CancellationToken::new()).unwrap();

        assert_eq!(a.optimized, b.optimized);
        assert_eq!(a.weights, b.weights);
    }

    #[test]
    fn cached_run_matches_uncached() {
        let prices = wavy_prices(270);
        let returns = prices.returns();
        let cache = Arc::new(WindowCache::new());
        let plain = RollingBacktestEngine::new(
            MeanVarianceOptimizer::default(),
            RollingConfig::default(),
        );
        let cached = RollingBacktestEngine::new(
            MeanVarianceOptimizer::default(),
            RollingConfig::default(),
        )
        .with_cache(Arc::clone(&cache));

        let expected = plain.run(&prices, &returns, &CancellationToken::new()).unwrap();
        let first = cached.run(&prices, &returns, &CancellationToken::new()).unwrap();
        let second = cached.run(&prices, &returns, &CancellationToken::new()).unwrap();

        assert_eq!(cache.len(), 270 - 252);
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[test]
    fn each_optimizer_configuration_gets_its_own_cache() {
        let prices = wavy_prices(270);
        let returns = prices.returns();
        let configs = [
            OptimizerConfig::default(),
            OptimizerConfig {
                risk_free_rate: 0.0,
                expected_returns: ExpectedReturns::Arithmetic,
                ..OptimizerConfig::default()
            },
        ];
        for config in configs {
            let rolling = RollingConfig {
                failure_policy: FailurePolicy::SkipWindow,
                ..RollingConfig::default()
            };
            let optimizer = MeanVarianceOptimizer::new(config.clone());
            let expected = RollingBacktestEngine::new(optimizer, rolling.clone())
                .run(&prices, &returns, &CancellationToken::new())
                .unwrap();
            let cached = RollingBacktestEngine::new(MeanVarianceOptimizer::new(config), rolling)
                .with_cache(Arc::new(WindowCache::new()));
            let first = cached.run(&prices, &returns, &CancellationToken::new()).unwrap();
            let second = cached.run(&prices, &returns, &CancellationToken::new()).unwrap();
            assert_eq!(first, expected);
            assert_eq!(second, expected);
        }
    }

    #[test]
    fn cancelled_before_start() {
        let prices = wavy_prices(260);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = analyze_prices(&prices, prices.dates()[0], &AnalysisSettings::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, FolioError::Cancelled { completed: 0 }));
    }
}
