//! `AppConfig` struct and TOML loading.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Settings shared by every lineup.
    #[serde(default)]
    pub defaults: BatchDefaults,
    /// Lineups grabbed by `zapgrid batch`.
    #[serde(default)]
    pub lineups: Vec<LineupConfig>,
}

/// `[defaults]` table.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchDefaults {
    /// Parent of the per-lineup cache directories.
    pub cache_base: PathBuf,
    /// Seconds slept before every request and between lineups.
    #[serde(alias = "sleep")]
    pub delay: f64,
    /// 0 = warnings only, 1 = info, 2+ = debug.
    pub verbosity: u8,
    /// Deliver documents over the socket by default.
    pub use_socket: bool,
    /// Default Unix socket path for delivery.
    pub socket: Option<PathBuf>,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            cache_base: PathBuf::from("cache"),
            delay: 0.5,
            verbosity: 1,
            use_socket: false,
            socket: None,
        }
    }
}

/// One `[[lineups]]` entry; unset fields fall back to `[defaults]`.
#[derive(Deserialize, Default, PartialEq)]
pub struct LineupConfig {
    /// Display name; also names the cache directory and default outfile.
    pub name: String,
    /// Account email.
    pub user: Option<String>,
    /// Account password.
    pub password: Option<String>,
    /// Postal/zip code.
    pub zip: Option<String>,
    /// Lineup ID for anonymous access.
    pub lineup_id: Option<String>,
    /// Output path (default `/tmp/{name}.xml`).
    pub outfile: Option<PathBuf>,
    /// Cache directory (default `{cache_base}/{name}`).
    pub cache: Option<PathBuf>,
    /// Per-lineup delay override.
    #[serde(alias = "sleep")]
    pub delay: Option<f64>,
    /// Per-lineup socket delivery override.
    pub use_socket: Option<bool>,
    /// Per-lineup socket path override.
    pub socket: Option<PathBuf>,
    /// Per-lineup log verbosity override.
    pub verbosity: Option<u8>,
}

impl fmt::Debug for LineupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineupConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "*****"))
            .field("zip", &self.zip)
            .field("lineup_id", &self.lineup_id)
            .field("outfile", &self.outfile)
            .field("cache", &self.cache)
            .field("delay", &self.delay)
            .field("use_socket", &self.use_socket)
            .field("socket", &self.socket)
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

impl AppConfig {
    /// Log verbosity for a batch run: the loudest of `[defaults]` and every
    /// lineup override, since one subscriber serves the whole process.
    #[must_use]
    pub fn batch_verbosity(&self) -> u8 {
        self.lineups
            .iter()
            .filter_map(|lineup| lineup.verbosity)
            .fold(self.defaults.verbosity, u8::max)
    }

    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}
