//! Grid window loop.

use anyhow::{Context, Result};
use zapgrid_api::gracenote::{FetchOutcome, GridQuery, GridResponse, LocalZapApi, Session};
use zapgrid_cache::{CacheKey, CacheStore, decode_json};

use crate::enrich::Enricher;
use crate::model::Schedule;
use crate::parser::parse_window;
use crate::window::{WINDOW_HOURS, WindowPlan};

/// Crawl counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Windows planned.
    pub planned: u32,
    /// Windows parsed into the schedule.
    pub parsed: u32,
    /// Windows served from the cache.
    pub cached: u32,
    /// Windows fetched from the network.
    pub fetched: u32,
    /// The grid ran out of data before the last planned window.
    pub stopped_early: bool,
}

/// Shared collaborators of one crawl.
#[derive(Debug)]
pub struct Crawler<'a, A> {
    api: &'a A,
    cache: &'a CacheStore,
    session: &'a mut Session,
}

impl<'a, A: LocalZapApi + Sync> Crawler<'a, A> {
    /// Creates a crawler.
    pub const fn new(api: &'a A, cache: &'a CacheStore, session: &'a mut Session) -> Self {
        Self {
            api,
            cache,
            session,
        }
    }

    /// Visits every planned window in order, folding each into `schedule`.
    ///
    /// A cached window is used as-is. A window the grid cannot deliver
    /// ends the loop; later windows are never requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established or a request
    /// cannot be built.
    pub async fn run(
        &mut self,
        plan: &WindowPlan,
        schedule: &mut Schedule,
        mut enricher: Option<&mut Enricher<'_, A>>,
    ) -> Result<CrawlStats> {
        let mut stats = CrawlStats {
            planned: plan.count,
            ..CrawlStats::default()
        };

        for (index, start_ms) in plan.windows() {
            if index == 0 {
                schedule.coverage.start_ms = Some(start_ms);
            }
            if plan.is_last(index) {
                schedule.coverage.end_ms = Some(plan.end_of(index));
            }

            let key = CacheKey::GridWindow(start_ms);
            let grid = if let Some(grid) = self.load_cached(&key) {
                stats.cached = stats.cached.saturating_add(1);
                grid
            } else {
                let account = self.session.params(self.api).await?;
                let query = GridQuery::new(start_ms, WINDOW_HOURS, account);
                let text = match self.api.grid(&query).await? {
                    FetchOutcome::Fetched(text) => text,
                    FetchOutcome::Failed => {
                        tracing::info!(window = index.saturating_add(1), start_ms, "Grid returned no data, stopping");
                        stats.stopped_early = true;
                        break;
                    }
                };
                stats.fetched = stats.fetched.saturating_add(1);
                if let Err(e) = self.cache.write(&key, &text) {
                    tracing::warn!(start_ms, error = %e, "Failed to cache grid window");
                }
                match decode_json::<GridResponse>(&text).context("undecodable grid window") {
                    Ok(grid) => grid,
                    Err(e) => {
                        tracing::warn!(start_ms, error = %e, "Skipping window");
                        continue;
                    }
                }
            };

            tracing::info!(
                window = index.saturating_add(1),
                total = plan.count,
                file = %self.cache.path(&key).display(),
                "Parsing"
            );
            let window = parse_window(schedule, &grid, enricher.as_deref_mut()).await;
            tracing::debug!(
                channels = window.channels,
                events = window.events,
                skipped = window.skipped,
                "Window parsed"
            );
            stats.parsed = stats.parsed.saturating_add(1);
        }

        Ok(stats)
    }

    /// Loads a cached window; an unreadable entry counts as a miss.
    fn load_cached(&self, key: &CacheKey) -> Option<GridResponse> {
        if !self.cache.exists(key) {
            return None;
        }
        match self.cache.read_json::<GridResponse>(key) {
            Ok(grid) => grid,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable cached window, refetching");
                None
            }
        }
    }
}
