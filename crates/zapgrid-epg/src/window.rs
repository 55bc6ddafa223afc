//! Grid window planning.

use chrono::{DateTime, TimeZone, Timelike};

/// Window span in hours.
pub const WINDOW_HOURS: u32 = 3;

/// Window span in milliseconds.
pub const WINDOW_MS: i64 = 3 * 3_600_000;

/// One day in milliseconds.
const DAY_MS: i64 = 86_400_000;

/// The sequence of grid windows a crawl visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    /// Start of the first window (epoch ms).
    pub first_start_ms: i64,
    /// Number of windows.
    pub count: u32,
}

impl WindowPlan {
    /// Plans `days` worth of windows starting relative to `now`.
    ///
    /// With `day_offset == 0` the first window starts at the current
    /// 3-hour boundary; otherwise at midnight, `day_offset` days ahead.
    /// Alignment uses the clock of `now`'s time zone.
    #[must_use]
    pub fn from_now<Tz: TimeZone>(now: &DateTime<Tz>, days: u32, day_offset: u32) -> Self {
        let hour = if day_offset == 0 {
            (now.hour() / WINDOW_HOURS).saturating_mul(WINDOW_HOURS)
        } else {
            0
        };
        let base_ms = now
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .map_or_else(
                || now.timestamp_millis(),
                |naive| {
                    now.timezone().from_local_datetime(&naive).earliest().map_or_else(
                        || naive.and_utc().timestamp_millis(),
                        |aligned| aligned.timestamp_millis(),
                    )
                },
            );

        Self {
            first_start_ms: base_ms.saturating_add(i64::from(day_offset).saturating_mul(DAY_MS)),
            count: days.saturating_mul(24 / WINDOW_HOURS),
        }
    }

    /// Start of window `index` (epoch ms).
    #[must_use]
    pub fn start_of(&self, index: u32) -> i64 {
        self.first_start_ms
            .saturating_add(i64::from(index).saturating_mul(WINDOW_MS))
    }

    /// Last millisecond covered by window `index`.
    #[must_use]
    pub fn end_of(&self, index: u32) -> i64 {
        self.start_of(index).saturating_add(WINDOW_MS - 1)
    }

    /// `(index, start_ms)` for every window in order.
    pub fn windows(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        (0..self.count).map(|index| (index, self.start_of(index)))
    }

    /// Returns `true` for the final planned window.
    #[must_use]
    pub fn is_last(&self, index: u32) -> bool {
        index.checked_add(1) == Some(self.count)
    }
}
