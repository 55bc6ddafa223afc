//! Grid window parser.

use chrono::NaiveDateTime;
use zapgrid_api::gracenote::{GridChannel, GridEvent, GridResponse, LocalZapApi};

use crate::enrich::Enricher;
use crate::model::{Schedule, ScheduleSlot, StationKey, merge_if_present};

/// Image asset host for grid thumbnails.
const ASSET_URL: &str = "https://zap2it.tmsimg.com/assets/";

/// Timestamp format of grid event times.
const GRID_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Per-window parse counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Channels applied.
    pub channels: usize,
    /// Events stored as schedule slots.
    pub events: usize,
    /// Events skipped (no program ID or bad timestamp).
    pub skipped: usize,
}

/// Parses a grid timestamp (`2024-01-01T12:00:00Z`) into epoch milliseconds.
#[must_use]
pub fn parse_grid_time(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value.trim(), GRID_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// A program/series pair to enrich after its slot is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EnrichTarget {
    program_id: String,
    series_id: String,
}

/// What happened to one grid event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EventOutcome {
    /// Dropped: no program ID or a bad timestamp.
    Skipped,
    /// Stored as a slot, with an optional enrichment target.
    Stored(Option<EnrichTarget>),
}

/// Applies one window to the schedule, enriching programs inline.
pub async fn parse_window<A: LocalZapApi + Sync>(
    schedule: &mut Schedule,
    grid: &GridResponse,
    mut enricher: Option<&mut Enricher<'_, A>>,
) -> WindowStats {
    let mut stats = WindowStats::default();

    for channel in &grid.channels {
        let Some(station) = apply_channel(schedule, channel) else {
            continue;
        };
        stats.channels = stats.channels.saturating_add(1);

        for event in &channel.events {
            let EventOutcome::Stored(target) = apply_event(schedule, &station, event) else {
                stats.skipped = stats.skipped.saturating_add(1);
                continue;
            };
            stats.events = stats.events.saturating_add(1);

            if let (Some(enricher), Some(target)) = (enricher.as_deref_mut(), target)
                && let Err(e) = enricher
                    .enrich(schedule, &target.program_id, &target.series_id)
                    .await
            {
                tracing::warn!(program_id = %target.program_id, error = %e, "Enrichment failed");
            }
        }
    }

    stats
}

/// Upserts the channel's station; channels without an ID are ignored.
fn apply_channel(schedule: &mut Schedule, channel: &GridChannel) -> Option<StationKey> {
    let channel_id = channel.channel_id.as_deref()?;
    let channel_no = channel.channel_no.as_deref().unwrap_or_default();
    let key = StationKey::new(channel_no, channel_id);
    schedule.upsert_station(
        key.clone(),
        channel_id,
        channel.call_sign.as_deref().unwrap_or_default(),
        channel_no,
    );
    Some(key)
}

/// Merges one event into the schedule.
///
/// Program fields are merged even when the event's timestamps turn out
/// to be unusable.
fn apply_event(schedule: &mut Schedule, station: &StationKey, event: &GridEvent) -> EventOutcome {
    let Some(program) = event.program.as_ref() else {
        return EventOutcome::Skipped;
    };
    let Some(program_id) = program.id.as_deref().filter(|id| !id.is_empty()) else {
        tracing::debug!(%station, "Skipping event without program ID");
        return EventOutcome::Skipped;
    };
    let duration = event.duration_secs();
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());

    let record = schedule.program_mut(program_id);
    merge_if_present(&mut record.title, non_empty(&program.title));
    merge_if_present(&mut record.episode_title, non_empty(&program.episode_title));
    merge_if_present(&mut record.release_year, non_empty(&program.release_year));
    merge_if_present(&mut record.season, program.season);
    merge_if_present(&mut record.episode, program.episode);
    merge_if_present(
        &mut record.image_url,
        non_empty(&event.thumbnail).map(|thumb| format!("{ASSET_URL}{thumb}.jpg")),
    );
    merge_if_present(&mut record.duration_secs, (duration > 0).then_some(duration));

    let Some(start_ms) = event.start().and_then(parse_grid_time) else {
        tracing::debug!(%program_id, start = ?event.start(), "Skipping event with bad start time");
        return EventOutcome::Skipped;
    };
    let end_ms = match event.end() {
        Some(end) => {
            let Some(end_ms) = parse_grid_time(end) else {
                tracing::debug!(%program_id, %end, "Skipping event with bad end time");
                return EventOutcome::Skipped;
            };
            Some(end_ms)
        }
        None => (duration > 0).then(|| start_ms.saturating_add(duration.saturating_mul(1000))),
    };

    schedule.upsert_slot(ScheduleSlot {
        start_ms,
        end_ms,
        program_id: String::from(program_id),
        station: station.clone(),
    });

    EventOutcome::Stored(non_empty(&program.series_id).map(|series_id| EnrichTarget {
        program_id: String::from(program_id),
        series_id,
    }))
}
