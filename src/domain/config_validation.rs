//! Configuration validation.
//!
//! Validates all config fields before any price data is read, then builds the
//! typed request and settings from the same keys.

use crate::domain::analysis::{AnalysisRequest, AnalysisSettings};
use crate::domain::error::FolioError;
use crate::domain::optimizer::{ExpectedReturns, OptimizerConfig, WeightCleaning};
use crate::domain::rolling::{FailurePolicy, RollingConfig};
use crate::domain::universe::{default_tickers, parse_tickers};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

// f64 carries about 15 significant decimal digits.
const MAX_ROUNDING_PLACES: i64 = 15;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), FolioError> {
    validate_dates(config)?;
    validate_tickers(config)?;
    validate_risk_free_rate(config)?;
    expected_returns(config)?;
    validate_clean_cutoff(config)?;
    validate_clean_rounding(config)?;
    validate_max_iterations(config)?;
    failure_policy(config)?;
    Ok(())
}

/// Builds the request from `[analysis]`. Call after validation.
pub fn analysis_request(config: &dyn ConfigPort) -> Result<AnalysisRequest, FolioError> {
    let (start_date, end_date) = validate_dates(config)?;
    let tickers = match config.get_non_empty("analysis", "tickers") {
        Some(s) => parse_tickers(&s)?,
        None => default_tickers(),
    };
    Ok(AnalysisRequest {
        tickers,
        start_date,
        end_date,
    })
}

pub fn analysis_settings(config: &dyn ConfigPort) -> Result<AnalysisSettings, FolioError> {
    let weight_cleaning = if config.get_bool("optimizer", "clean_weights", false) {
        Some(WeightCleaning {
            cutoff: validate_clean_cutoff(config)?,
            rounding: validate_clean_rounding(config)?,
        })
    } else {
        None
    };

    let optimizer = OptimizerConfig {
        risk_free_rate: validate_risk_free_rate(config)?,
        expected_returns: expected_returns(config)?,
        weight_cleaning,
        max_iterations: validate_max_iterations(config)?,
    };
    let rolling = RollingConfig {
        failure_policy: failure_policy(config)?,
        parallel: config.get_bool("backtest", "parallel", false),
    };
    Ok(AnalysisSettings { optimizer, rolling })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FolioError {
    FolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Reads a float, rejecting values that are present but not numeric.
fn parse_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, FolioError> {
    match config.get_non_empty(section, key) {
        None => Ok(default),
        Some(s) => s
            .parse::<f64>()
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", s))),
    }
}

fn parse_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, FolioError> {
    match config.get_non_empty(section, key) {
        None => Ok(default),
        Some(s) => s
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", s))),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), FolioError> {
    let start_str = config.get_string("analysis", "start_date");
    let end_str = config.get_string("analysis", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "analysis",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok((start_date, end_date))
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, FolioError> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Err(FolioError::ConfigMissing {
            section: "analysis".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            invalid(
                "analysis",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), FolioError> {
    if let Some(s) = config.get_non_empty("analysis", "tickers") {
        parse_tickers(&s).map_err(|e| invalid("analysis", "tickers", e.to_string()))?;
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<f64, FolioError> {
    let default = OptimizerConfig::default().risk_free_rate;
    let value = parse_double(config, "optimizer", "risk_free_rate", default)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "optimizer",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(value)
}

fn expected_returns(config: &dyn ConfigPort) -> Result<ExpectedReturns, FolioError> {
    match config.get_non_empty("optimizer", "expected_returns") {
        None => Ok(ExpectedReturns::Geometric),
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "geometric" => Ok(ExpectedReturns::Geometric),
            "arithmetic" => Ok(ExpectedReturns::Arithmetic),
            other => Err(invalid(
                "optimizer",
                "expected_returns",
                format!("unknown estimator '{}', expected geometric or arithmetic", other),
            )),
        },
    }
}

fn validate_clean_cutoff(config: &dyn ConfigPort) -> Result<f64, FolioError> {
    let default = WeightCleaning::default().cutoff;
    let value = parse_double(config, "optimizer", "clean_cutoff", default)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "optimizer",
            "clean_cutoff",
            "clean_cutoff must be between 0 and 1",
        ));
    }
    Ok(value)
}

/// Decimal places kept by cleaning. A negative value disables rounding.
fn validate_clean_rounding(config: &dyn ConfigPort) -> Result<Option<u32>, FolioError> {
    let value = parse_int(config, "optimizer", "clean_rounding", 5)?;
    if value > MAX_ROUNDING_PLACES {
        return Err(invalid(
            "optimizer",
            "clean_rounding",
            format!("clean_rounding must be at most {}", MAX_ROUNDING_PLACES),
        ));
    }
    Ok(u32::try_from(value).ok())
}

fn validate_max_iterations(config: &dyn ConfigPort) -> Result<usize, FolioError> {
    let value = parse_int(config, "optimizer", "max_iterations", 500)?;
    match usize::try_from(value) {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(invalid(
            "optimizer",
            "max_iterations",
            "max_iterations must be at least 1",
        )),
    }
}

fn failure_policy(config: &dyn ConfigPort) -> Result<FailurePolicy, FolioError> {
    match config.get_non_empty("backtest", "failure_policy") {
        None => Ok(FailurePolicy::FailFast),
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "fail_fast" => Ok(FailurePolicy::FailFast),
            "skip" => Ok(FailurePolicy::SkipWindow),
            other => Err(invalid(
                "backtest",
                "failure_policy",
                format!("unknown policy '{}', expected fail_fast or skip", other),
            )),
        },
    }
}
