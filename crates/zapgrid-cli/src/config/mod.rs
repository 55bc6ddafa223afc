//! Application configuration module.
//!
//! Manages the TOML config file holding batch defaults and the
//! lineups to grab.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, BatchDefaults, LineupConfig};
pub use paths::resolve_config_path;
