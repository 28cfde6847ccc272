//! Port traits for the external collaborators: price data, configuration, and
//! the presentation layer.

pub mod config_port;
pub mod data_port;
pub mod report_port;
