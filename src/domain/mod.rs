//! Core domain types and logic.

pub mod series;
pub mod drawdown;
pub mod stats;
pub mod equal_weight;
pub mod optimizer;
pub mod rolling;
pub mod cache;
pub mod universe;
pub mod analysis;
pub mod config_validation;
pub mod error;
