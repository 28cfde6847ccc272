//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{AnalysisReport, AnalysisRequest, AnalysisSettings, run_analysis};
use crate::domain::config_validation::{
    analysis_request, analysis_settings, validate_analysis_config,
};
use crate::domain::error::FolioError;
use crate::domain::rolling::CancellationToken;
use crate::domain::stats::StatsRow;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    about = "Rolling max-Sharpe portfolio backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rolling backtest and write the CSV report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated tickers, overriding [analysis] tickers
        #[arg(long)]
        tickers: Option<String>,
        /// Directory of <TICKER>.csv price files, overriding [data] prices_dir
        #[arg(long)]
        prices_dir: Option<PathBuf>,
        /// Report directory, overriding [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            tickers,
            prices_dir,
            output,
            dry_run,
        } => {
            let overrides = Overrides {
                tickers,
                prices_dir,
                output,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides)
            }
        }
        Command::Validate { config } => run_validate(&config),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub tickers: Option<String>,
    pub prices_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: FolioError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Everything a run needs, resolved from config plus overrides.
struct RunPlan {
    request: AnalysisRequest,
    settings: AnalysisSettings,
    prices_dir: PathBuf,
    output_dir: PathBuf,
}

fn build_plan(adapter: &dyn ConfigPort, overrides: &Overrides) -> Result<RunPlan, FolioError> {
    validate_analysis_config(adapter)?;

    let mut request = analysis_request(adapter)?;
    if let Some(tickers) = &overrides.tickers {
        request.tickers = parse_tickers(tickers)?;
    }
    let settings = analysis_settings(adapter)?;

    let prices_dir = overrides
        .prices_dir
        .clone()
        .or_else(|| adapter.get_non_empty("data", "prices_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("prices"));
    let output_dir = overrides
        .output
        .clone()
        .or_else(|| adapter.get_non_empty("report", "output_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("report"));

    Ok(RunPlan {
        request,
        settings,
        prices_dir,
        output_dir,
    })
}

fn run_backtest(config_path: &Path, overrides: &Overrides) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let plan = match build_plan(&adapter, overrides) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    // Stage 2: Fetch, optimize, summarize
    eprintln!(
        "Running backtest: {} tickers, {} to {} (history from {})",
        plan.request.tickers.len(),
        plan.request.start_date,
        plan.request.end_date,
        plan.request.fetch_start(),
    );
    let data_port = CsvPriceAdapter::new(plan.prices_dir.clone());
    let cancel = CancellationToken::new();
    let report = match run_analysis(&data_port, &plan.request, &plan.settings, &cancel) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 3: Console summary
    print_summary(&report);

    // Stage 4: Write report
    match CsvReportAdapter::new().write(&report, &plan.output_dir) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", plan.output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_stats(title: &str, rows: &[StatsRow]) {
    eprintln!("\n=== {} ===", title);
    eprintln!(
        "  {:<14} {:>6} {:>12} {:>12} {:>12} {:>10} {:>12}",
        "name", "obs", "cumulative", "mean daily", "volatility", "sharpe", "max dd"
    );
    for row in rows {
        eprintln!(
            "  {:<14} {:>6} {:>12.6} {:>12.6} {:>12.6} {:>10.4} {:>12.6}",
            row.name,
            row.observations,
            row.cumulative_return,
            row.mean_daily_return,
            row.annualized_volatility,
            row.sharpe_ratio,
            row.max_drawdown,
        );
    }
}

fn print_summary(report: &AnalysisReport) {
    print_stats("Asset Statistics", &report.asset_stats);
    print_stats("Portfolio Statistics", &report.portfolio_stats);

    if let Some(last) = report.weights.rows.last() {
        eprintln!("\n=== Latest Weights ({}) ===", last.date);
        for (ticker, weight) in &last.weights {
            eprintln!("  {:<8} {:.5}", ticker, weight);
        }
    }

    if !report.skipped.is_empty() {
        eprintln!("\nSkipped {} windows:", report.skipped.len());
        for date in &report.skipped {
            eprintln!("  {}", date);
        }
    }
}

pub fn run_dry_run(config_path: &Path, overrides: &Overrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let plan = match build_plan(&adapter, overrides) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");

    let optimizer = &plan.settings.optimizer;
    eprintln!("\nUniverse:");
    eprintln!("  tickers: {}", plan.request.tickers.join(", "));
    eprintln!(
        "  period:  {} to {} (history from {})",
        plan.request.start_date,
        plan.request.end_date,
        plan.request.fetch_start()
    );
    eprintln!("\nOptimizer:");
    eprintln!("  risk_free_rate:   {}", optimizer.risk_free_rate);
    eprintln!("  expected_returns: {:?}", optimizer.expected_returns);
    eprintln!("  max_iterations:   {}", optimizer.max_iterations);
    match &optimizer.weight_cleaning {
        Some(c) => eprintln!(
            "  clean_weights:    cutoff {}, rounding {:?}",
            c.cutoff, c.rounding
        ),
        None => eprintln!("  clean_weights:    off"),
    }
    eprintln!("\nBacktest:");
    eprintln!("  failure_policy: {:?}", plan.settings.rolling.failure_policy);
    eprintln!("  parallel:       {}", plan.settings.rolling.parallel);
    eprintln!("\nData:   {}", plan.prices_dir.display());
    eprintln!("Report: {}", plan.output_dir.display());

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_analysis_config(&adapter) {
        return fail(e);
    }

    eprintln!("Config is valid");
    ExitCode::SUCCESS
}
