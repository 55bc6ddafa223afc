//! Run orchestration: bootstrap, crawl, render, write.

use std::io::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::instrument;
use zapgrid_api::gracenote::{Credentials, LocalZapApi, Session, TransferStats};
use zapgrid_cache::CacheStore;

use crate::crawler::{CrawlStats, Crawler};
use crate::enrich::{EnrichStats, Enricher};
use crate::model::Schedule;
use crate::options::{EngineOptions, OutputTarget};
use crate::window::WindowPlan;
use crate::xmltv::{XmltvOptions, render};

/// A crawled schedule with its counters.
#[derive(Debug)]
pub struct Collected {
    /// The finished schedule.
    pub schedule: Schedule,
    /// Window counters.
    pub crawl: CrawlStats,
    /// Enrichment counters.
    pub enrich: EnrichStats,
}

/// Outcome of a complete grab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Where the document went.
    pub output: OutputTarget,
    /// Document size in bytes.
    pub document_bytes: usize,
    /// Network counters.
    pub transfer: TransferStats,
    /// Window counters.
    pub crawl: CrawlStats,
    /// Enrichment counters.
    pub enrich: EnrichStats,
    /// Stations written.
    pub stations: usize,
    /// Programs known.
    pub programs: usize,
    /// Schedule slots known.
    pub slots: usize,
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// Wall time spent rendering and writing.
    pub write_elapsed: Duration,
}

/// Plans the crawl windows, aligned on the UTC or the local clock.
#[must_use]
pub fn plan_windows(options: &EngineOptions, now: DateTime<Utc>) -> WindowPlan {
    if options.use_utc {
        WindowPlan::from_now(&now, options.days, options.day_offset)
    } else {
        WindowPlan::from_now(&now.with_timezone(&Local), options.days, options.day_offset)
    }
}

/// Renders options for the XMLTV writer.
#[must_use]
pub fn xmltv_options(options: &EngineOptions) -> XmltvOptions {
    XmltvOptions {
        encoding: options.encoding,
        lang: options.lang.clone(),
        escapes: options.escapes,
        numeric_entities: options.numeric_entities,
        time_shift_minutes: options.time_shift_minutes,
    }
}

/// Crawls every planned window into a fresh schedule.
///
/// Credentials are validated before anything else; the login request
/// itself is deferred until the first window missing from the cache.
///
/// # Errors
///
/// Returns an error if no credentials are configured, the cache directory
/// cannot be created, or the session cannot be established.
pub async fn collect<A: LocalZapApi + Sync>(
    api: &A,
    options: &EngineOptions,
    plan: &WindowPlan,
) -> Result<Collected> {
    let credentials = Credentials::resolve(
        options.username.as_deref(),
        options.password.as_deref(),
        options.lineup_id.as_deref(),
        options.postal_code.as_deref(),
    )?;
    let cache = CacheStore::open(&options.cache_dir)?;
    let mut session = Session::new(credentials);
    let mut schedule = Schedule::new();
    let mut enricher = options.enrich.then(|| Enricher::new(api, &cache));

    let crawl = Crawler::new(api, &cache, &mut session)
        .run(plan, &mut schedule, enricher.as_mut())
        .await?;
    let enrich = enricher.as_ref().map(Enricher::stats).unwrap_or_default();

    Ok(Collected {
        schedule,
        crawl,
        enrich,
    })
}

/// Writes the document to standard output or, via a temporary file and
/// rename, to a path.
///
/// # Errors
///
/// Returns an error if the document cannot be written.
pub fn write_output(target: &OutputTarget, document: &[u8]) -> Result<()> {
    match target {
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document)
                .and_then(|()| stdout.flush())
                .context("failed to write to stdout")
        }
        OutputTarget::File(path) => write_file_atomically(path, document),
    }
}

fn write_file_atomically(path: &Path, document: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("output path has no file name: {}", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, document)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} to {}", tmp.display(), path.display()))
}

/// Runs a complete grab: crawl, render on the local clock, write.
///
/// # Errors
///
/// Returns an error on a bootstrap failure or if the document cannot be
/// written. Skipped events and failed enrichments never fail the run.
#[instrument(skip_all, fields(days = options.days, enrich = options.enrich))]
pub async fn grab<A: LocalZapApi + Sync>(api: &A, options: &EngineOptions) -> Result<RunSummary> {
    grab_at(api, options, Utc::now(), &Local).await
}

/// [`grab`] with an explicit clock and rendering time zone.
///
/// # Errors
///
/// See [`grab`].
pub async fn grab_at<A, Tz>(
    api: &A,
    options: &EngineOptions,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<RunSummary>
where
    A: LocalZapApi + Sync,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let started = Instant::now();
    if options.delay <= 0.0 {
        tracing::warn!("No delay between requests; the listings site may throttle this client");
    }

    let plan = plan_windows(options, now);
    tracing::info!(
        windows = plan.count,
        first_start_ms = plan.first_start_ms,
        cache = %options.cache_dir.display(),
        "Starting grab"
    );
    let collected = collect(api, options, &plan).await?;

    let write_started = Instant::now();
    let document = render(&collected.schedule, &xmltv_options(options), tz)?;
    let output = options.output_target();
    write_output(&output, &document)?;

    let schedule = &collected.schedule;
    let summary = RunSummary {
        output,
        document_bytes: document.len(),
        transfer: api.transfer_stats(),
        crawl: collected.crawl,
        enrich: collected.enrich,
        stations: schedule.station_count(),
        programs: schedule.program_count(),
        slots: schedule.slot_count(),
        elapsed: started.elapsed(),
        write_elapsed: write_started.elapsed(),
    };

    tracing::info!(
        bytes = summary.transfer.bytes,
        requests = summary.transfer.requests,
        connections = summary.transfer.connections.max(1),
        "Download complete"
    );
    tracing::info!(
        succeeded = summary.enrich.succeeded,
        failed = summary.enrich.failed,
        cached = summary.enrich.cached,
        "Overview requests"
    );
    tracing::info!(
        output = %options.output,
        coverage_start_ms = ?schedule.coverage.start_ms,
        coverage_end_ms = ?schedule.coverage.end_ms,
        "Wrote XMLTV document"
    );
    tracing::info!(
        elapsed_secs = summary.elapsed.as_secs(),
        write_secs = summary.write_elapsed.as_secs(),
        stations = summary.stations,
        programs = summary.programs,
        scheduled = summary.slots,
        "Completed"
    );

    Ok(summary)
}
