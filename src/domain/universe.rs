//! Ticker universe parsing and validation.

use std::collections::HashSet;

/// Used when no tickers are configured.
pub const DEFAULT_TICKERS: [&str; 10] = [
    "NVDA", "AAPL", "XOM", "PFE", "COST", "MO", "O", "BAC", "TSLA", "MCD",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn default_tickers() -> Vec<String> {
    DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect()
}

/// Comma-separated, trimmed and upper-cased; order is preserved.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Requested tickers absent from `available`, in request order.
pub fn missing_tickers(requested: &[String], available: &[String]) -> Vec<String> {
    let available: HashSet<&str> = available.iter().map(String::as_str).collect();
    requested
        .iter()
        .filter(|t| !available.contains(t.as_str()))
        .cloned()
        .collect()
}
