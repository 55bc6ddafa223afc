//! Sequential multi-lineup runs driven by the config file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::instrument;
use zapgrid_api::gracenote::LocalZapApi;
use zapgrid_epg::EngineOptions;

use crate::config::{AppConfig, BatchDefaults, LineupConfig};

/// One lineup with its defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Lineup name.
    pub name: String,
    /// Options for the grab.
    pub options: EngineOptions,
    /// Send the document over the socket after writing it.
    pub use_socket: bool,
    /// Socket path, if any was configured.
    pub socket: Option<PathBuf>,
    /// Pause after this entry.
    pub delay: Duration,
    /// Log verbosity requested for this entry.
    pub verbosity: u8,
}

impl BatchEntry {
    /// Merges a `[[lineups]]` entry with `[defaults]`.
    #[must_use]
    pub fn resolve(lineup: &LineupConfig, defaults: &BatchDefaults) -> Self {
        let safe_name = lineup.name.replace(' ', "_");
        let cache_dir = lineup
            .cache
            .clone()
            .unwrap_or_else(|| defaults.cache_base.join(&safe_name));
        let output = lineup
            .outfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/tmp/{safe_name}.xml")));
        let delay = lineup.delay.unwrap_or(defaults.delay);

        let options = EngineOptions {
            enrich: true,
            username: lineup.user.clone(),
            password: lineup.password.clone(),
            lineup_id: lineup.lineup_id.clone(),
            postal_code: lineup.zip.clone(),
            output: output.display().to_string(),
            delay,
            cache_dir,
            ..EngineOptions::default()
        };

        Self {
            name: lineup.name.clone(),
            delay: options.delay_duration(),
            options,
            use_socket: lineup.use_socket.unwrap_or(defaults.use_socket),
            socket: lineup.socket.clone().or_else(|| defaults.socket.clone()),
            verbosity: lineup.verbosity.unwrap_or(defaults.verbosity),
        }
    }
}

/// Totals of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries that completed.
    pub succeeded: usize,
    /// Entries that failed.
    pub failed: usize,
}

/// Grabs every configured lineup in order, one client per entry.
///
/// A failed entry is logged and counted; the remaining entries still run.
///
/// # Errors
///
/// Returns an error if the config has no lineups.
#[instrument(skip_all)]
pub async fn run_batch<A, F>(config: &AppConfig, make_api: F) -> Result<BatchReport>
where
    A: LocalZapApi + Sync,
    F: Fn(&EngineOptions) -> Result<A>,
{
    if config.lineups.is_empty() {
        bail!("No lineups configured");
    }
    tracing::info!(count = config.lineups.len(), "Found lineups");

    let mut report = BatchReport::default();
    for (position, lineup) in config.lineups.iter().enumerate() {
        let entry = BatchEntry::resolve(lineup, &config.defaults);
        tracing::info!(
            lineup = %entry.name,
            output = %entry.options.output,
            cache = %entry.options.cache_dir.display(),
            verbosity = entry.verbosity,
            "Running lineup"
        );

        let started = Instant::now();
        let result = match make_api(&entry.options) {
            Ok(api) => run_entry(&entry, &api).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                report.succeeded = report.succeeded.saturating_add(1);
                tracing::info!(
                    lineup = %entry.name,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Lineup completed"
                );
            }
            Err(e) => {
                report.failed = report.failed.saturating_add(1);
                tracing::error!(lineup = %entry.name, error = %format!("{e:#}"), "Lineup failed");
            }
        }

        if position.saturating_add(1) < config.lineups.len() && !entry.delay.is_zero() {
            tokio::time::sleep(entry.delay).await;
        }
    }

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "All lineups processed"
    );
    Ok(report)
}

/// Grabs one entry and delivers it when requested.
async fn run_entry<A: LocalZapApi + Sync>(entry: &BatchEntry, api: &A) -> Result<()> {
    zapgrid_epg::grab(api, &entry.options).await?;

    if !entry.use_socket {
        return Ok(());
    }
    let Some(socket) = entry.socket.as_deref() else {
        bail!("use_socket is set but no socket path is configured");
    };
    let document = std::fs::read(&entry.options.output)
        .with_context(|| format!("failed to read {}", entry.options.output))?;
    send(socket, &document).await
}

#[cfg(unix)]
async fn send(socket: &std::path::Path, document: &[u8]) -> Result<()> {
    crate::deliver::deliver(socket, document).await
}

#[cfg(not(unix))]
async fn send(socket: &std::path::Path, _document: &[u8]) -> Result<()> {
    bail!(
        "socket delivery to {} requires a Unix platform",
        socket.display()
    )
}
