//! Application glue module
//!
//! Driver configuration and environment detection.

mod config;

pub use config::{ConfigError, DriverConfig, ResolvedConfig, DEFAULT_RICH_TERMINAL_ENV};
