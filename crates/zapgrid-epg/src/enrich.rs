//! Per-series overview enrichment.

use std::collections::HashSet;

use anyhow::Result;
use zapgrid_api::gracenote::{FetchOutcome, LocalZapApi, OverviewResponse};
use zapgrid_cache::{CacheKey, CacheStore, decode_json};

use crate::model::{CreditRole, Program, Schedule, merge_if_present};

/// Enrichment counters for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Overview requests that returned usable details.
    pub succeeded: u64,
    /// Overview requests that failed.
    pub failed: u64,
    /// Overviews served from the cache.
    pub cached: u64,
}

/// Merges overview details into programs, cache first.
///
/// A series whose overview request fails once is never requested again
/// during the run, whichever program references it. Every airing merges
/// again, so list fields grow by one copy per airing.
#[derive(Debug)]
pub struct Enricher<'a, A> {
    api: &'a A,
    cache: &'a CacheStore,
    failed_series: HashSet<String>,
    stats: EnrichStats,
}

impl<'a, A: LocalZapApi + Sync> Enricher<'a, A> {
    /// Creates an enricher over the given API and cache.
    #[must_use]
    pub fn new(api: &'a A, cache: &'a CacheStore) -> Self {
        Self {
            api,
            cache,
            failed_series: HashSet::new(),
            stats: EnrichStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> EnrichStats {
        self.stats
    }

    /// Returns `true` when `series_id` has failed during this run.
    #[must_use]
    pub fn has_failed(&self, series_id: &str) -> bool {
        self.failed_series.contains(series_id)
    }

    /// Enriches `program_id` with the overview of `series_id`.
    ///
    /// A failed request is not an error: the series is remembered as
    /// failed and the program is left as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built.
    pub async fn enrich(
        &mut self,
        schedule: &mut Schedule,
        program_id: &str,
        series_id: &str,
    ) -> Result<()> {
        if self.failed_series.contains(series_id) {
            return Ok(());
        }

        let key = CacheKey::Overview(String::from(program_id));
        if self.cache.exists(&key) {
            match self.cache.read_json::<OverviewResponse>(&key) {
                Ok(Some(overview)) => {
                    tracing::debug!(%program_id, "Overview cache hit");
                    self.stats.cached = self.stats.cached.saturating_add(1);
                    merge_overview(schedule.program_mut(program_id), &overview);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%program_id, error = %e, "Unreadable overview cache entry, refetching");
                }
            }
        }

        tracing::debug!(%program_id, %series_id, "Fetching overview");
        let overview = match self.api.overview(series_id).await? {
            FetchOutcome::Fetched(text) => match decode_json::<OverviewResponse>(&text) {
                Ok(overview) => {
                    if let Err(e) = self.cache.write(&key, &text) {
                        tracing::warn!(%program_id, error = %e, "Failed to cache overview");
                    }
                    overview
                }
                Err(e) => {
                    tracing::warn!(%program_id, %series_id, error = %e, "Undecodable overview");
                    self.mark_failed(series_id);
                    return Ok(());
                }
            },
            FetchOutcome::Failed => {
                tracing::warn!(%program_id, %series_id, "Overview unavailable, skipping series");
                self.mark_failed(series_id);
                return Ok(());
            }
        };

        self.stats.succeeded = self.stats.succeeded.saturating_add(1);
        merge_overview(schedule.program_mut(program_id), &overview);
        Ok(())
    }

    fn mark_failed(&mut self, series_id: &str) {
        self.failed_series.insert(String::from(series_id));
        self.stats.failed = self.stats.failed.saturating_add(1);
    }
}

/// Merges overview details into a program.
pub fn merge_overview(program: &mut Program, overview: &OverviewResponse) {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());

    if let Some(ref tab) = overview.overview_tab {
        merge_if_present(
            &mut program.description,
            non_empty(&tab.long_description).or_else(|| non_empty(&tab.short_description)),
        );

        for (rank, genre) in (1_usize..).zip(tab.genres.iter()) {
            if let Some(name) = genre.name().filter(|n| !n.is_empty()) {
                program.genres.entry(name.to_lowercase()).or_insert(rank);
            }
        }

        for member in &tab.cast {
            if let Some(name) = member.display_name().filter(|n| !n.is_empty()) {
                let role = member
                    .role
                    .as_deref()
                    .or(member.billing.as_deref())
                    .unwrap_or_default();
                program.credits.push(CreditRole::from_cast_role(role), name);
            }
        }

        for member in &tab.crew {
            let Some(name) = member.display_name().filter(|n| !n.is_empty()) else {
                continue;
            };
            if let Some(role) = member.job.as_deref().and_then(CreditRole::from_crew_job) {
                program.credits.push(role, name);
            }
        }
    }

    let air_date = overview.original_air_date().map(|raw| {
        raw.chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
    });
    merge_if_present(
        &mut program.original_air_date,
        air_date.filter(|digits| !digits.is_empty()),
    );
    merge_if_present(&mut program.star_rating, overview.star_rating());
    merge_if_present(&mut program.rating, overview.rating_code());
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Mutex;

    use zapgrid_api::gracenote::{GridQuery, LoginResponse, TransferStats};

    use super::*;

    /// Mock API answering overview requests from a fixed table.
    struct MockZapApi {
        overviews: Vec<(&'static str, &'static str)>,
        calls: Mutex<Vec<String>>,
    }

    impl MockZapApi {
        fn new(overviews: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                overviews,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LocalZapApi for MockZapApi {
        async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse> {
            Ok(LoginResponse::default())
        }

        async fn grid(&self, _query: &GridQuery) -> Result<FetchOutcome<String>> {
            Ok(FetchOutcome::Failed)
        }

        async fn overview(&self, series_id: &str) -> Result<FetchOutcome<String>> {
            self.calls.lock().unwrap().push(String::from(series_id));
            Ok(self
                .overviews
                .iter()
                .find(|(sid, _)| *sid == series_id)
                .map_or(FetchOutcome::Failed, |(_, body)| {
                    FetchOutcome::Fetched(String::from(*body))
                }))
        }

        fn transfer_stats(&self) -> TransferStats {
            TransferStats::default()
        }
    }

    const OVERVIEW: &str = r#"{
        "overviewTab": {
            "longDescription": "Long.",
            "shortDescription": "Short.",
            "genres": [{"genreName": "Drama"}, {"genreName": "Crime"}, {"genreName": "drama"}],
            "cast": [
                {"role": "Actor", "fullName": "Ann Actor"},
                {"billing": "Host", "name": "Harry Host"},
                {"role": "Cameo", "fullName": "Greta Guest"},
                {"role": "Actor"}
            ],
            "crew": [
                {"job": "Executive Producer", "fullName": "Pat Producer"},
                {"job": "Composer", "fullName": "Carl Composer"}
            ],
            "starRating": "3",
            "rating": {"code": "TV-14"}
        },
        "originalAirDate": "2019-05-12T00:00:00Z"
    }"#;

    #[test]
    fn test_merge_overview_fields() {
        // Arrange
        let overview: OverviewResponse = serde_json::from_str(OVERVIEW).unwrap();
        let mut program = Program::default();

        // Act
        merge_overview(&mut program, &overview);

        // Assert
        assert_eq!(program.description.as_deref(), Some("Long."));
        assert_eq!(program.genres.get("drama"), Some(&1));
        assert_eq!(program.genres.get("crime"), Some(&2));
        assert_eq!(program.credits.get(CreditRole::Actor), ["Ann Actor"]);
        assert_eq!(program.credits.get(CreditRole::Presenter), ["Harry Host"]);
        assert_eq!(program.credits.get(CreditRole::Guest), ["Greta Guest"]);
        assert_eq!(program.credits.get(CreditRole::Producer), ["Pat Producer"]);
        assert!(program.credits.get(CreditRole::Director).is_empty());
        assert_eq!(program.original_air_date.as_deref(), Some("20190512000000"));
        assert_eq!(program.star_rating, Some(3.0));
        assert_eq!(program.rating.as_deref(), Some("TV-14"));
    }

    #[test]
    fn test_merge_short_description_and_plain_rating() {
        // Arrange
        let overview: OverviewResponse = serde_json::from_str(
            r#"{"overviewTab":{"shortDescription":"Short.","starRating":"n/a","rating":"PG"}}"#,
        )
        .unwrap();
        let mut program = Program {
            star_rating: Some(2.5),
            ..Program::default()
        };

        // Act
        merge_overview(&mut program, &overview);

        // Assert
        assert_eq!(program.description.as_deref(), Some("Short."));
        assert_eq!(program.star_rating, Some(2.5));
        assert_eq!(program.rating.as_deref(), Some("PG"));
    }

    #[tokio::test]
    async fn test_failed_series_is_sticky() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let api = MockZapApi::new(vec![]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();

        // Act
        enricher.enrich(&mut schedule, "EP1", "SH1").await.unwrap();
        enricher.enrich(&mut schedule, "EP2", "SH1").await.unwrap();
        enricher.enrich(&mut schedule, "EP3", "SH1").await.unwrap();

        // Assert
        assert_eq!(api.calls(), ["SH1"]);
        assert!(enricher.has_failed("SH1"));
        assert_eq!(enricher.stats().failed, 1);
        assert!(!cache.exists(&CacheKey::Overview(String::from("EP1"))));
    }

    #[tokio::test]
    async fn test_fetch_caches_then_serves_from_cache() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let api = MockZapApi::new(vec![("SH1", OVERVIEW)]);
        let mut schedule = Schedule::new();

        // Act
        let mut first = Enricher::new(&api, &cache);
        first.enrich(&mut schedule, "EP1", "SH1").await.unwrap();
        let mut second = Enricher::new(&api, &cache);
        let mut warm = Schedule::new();
        second.enrich(&mut warm, "EP1", "SH1").await.unwrap();

        // Assert
        assert_eq!(api.calls().len(), 1);
        assert_eq!(first.stats().succeeded, 1);
        assert_eq!(second.stats().cached, 1);
        assert!(cache.exists(&CacheKey::Overview(String::from("EP1"))));
        assert_eq!(schedule.program("EP1"), warm.program("EP1"));
    }

    #[tokio::test]
    async fn test_each_airing_appends_credits() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let api = MockZapApi::new(vec![("SH1", OVERVIEW)]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();

        // Act
        enricher.enrich(&mut schedule, "EP1", "SH1").await.unwrap();
        enricher.enrich(&mut schedule, "EP1", "SH1").await.unwrap();

        // Assert: the second airing is served from the cache and appended
        let program = schedule.program("EP1").unwrap();
        assert_eq!(
            program.credits.get(CreditRole::Actor),
            ["Ann Actor", "Ann Actor"]
        );
        assert_eq!(program.genres.get("drama"), Some(&1));
        assert_eq!(api.calls().len(), 1);
        assert_eq!(enricher.stats().succeeded, 1);
        assert_eq!(enricher.stats().cached, 1);
    }

    #[tokio::test]
    async fn test_two_airings_in_one_window_append_credits() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let api = MockZapApi::new(vec![("SH1", OVERVIEW)]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();
        let grid: zapgrid_api::gracenote::GridResponse = serde_json::from_str(
            r#"{"channels":[{"channelId":"1","channelNo":"2","events":[
                {"program":{"id":"EP1","seriesId":"SH1"},"startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-01T01:00:00Z"},
                {"program":{"id":"EP1","seriesId":"SH1"},"startTime":"2024-01-01T01:00:00Z","endTime":"2024-01-01T02:00:00Z"}
            ]}]}"#,
        )
        .unwrap();

        // Act
        crate::parser::parse_window(&mut schedule, &grid, Some(&mut enricher)).await;

        // Assert
        let program = schedule.program("EP1").unwrap();
        assert_eq!(program.credits.get(CreditRole::Actor).len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cached_overview_is_refetched() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let key = CacheKey::Overview(String::from("EP1"));
        std::fs::write(cache.path(&key), b"not gzip at all").unwrap();
        let api = MockZapApi::new(vec![("SH1", OVERVIEW)]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();

        // Act
        enricher.enrich(&mut schedule, "EP1", "SH1").await.unwrap();

        // Assert
        assert_eq!(api.calls(), ["SH1"]);
        assert_eq!(enricher.stats().cached, 0);
        assert_eq!(enricher.stats().succeeded, 1);
        let program = schedule.program("EP1").unwrap();
        assert_eq!(program.description.as_deref(), Some("Long."));
        assert!(cache.read_text(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_truncated_cached_overview_is_refetched() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let key = CacheKey::Overview(String::from("EP1"));
        cache.write(&key, r#"{"overviewTab":"#).unwrap();
        let api = MockZapApi::new(vec![("SH1", OVERVIEW)]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();

        // Act
        enricher.enrich(&mut schedule, "EP1", "SH1").await.unwrap();

        // Assert
        assert_eq!(api.calls(), ["SH1"]);
        assert_eq!(
            schedule.program("EP1").unwrap().credits.get(CreditRole::Actor),
            ["Ann Actor"]
        );
    }

    #[tokio::test]
    async fn test_undecodable_overview_marks_failure() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let api = MockZapApi::new(vec![("SH9", "<html>")]);
        let mut enricher = Enricher::new(&api, &cache);
        let mut schedule = Schedule::new();

        // Act
        enricher.enrich(&mut schedule, "EP9", "SH9").await.unwrap();

        // Assert
        assert!(enricher.has_failed("SH9"));
        assert!(schedule.program("EP9").is_none());
    }
}
