//! Gracenote listings API response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::json::{
    collect_valid, deserialize_lenient_bool, deserialize_lenient_i64, deserialize_lenient_string,
    deserialize_skip_invalid, value_to_f64, value_to_string,
};

/// `api/user/login` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    /// Session token.
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub token: Option<String>,
    /// Account subscribes to music channels.
    #[serde(rename = "isMusic", deserialize_with = "deserialize_lenient_bool", default)]
    pub is_music: bool,
    /// Account subscribes to pay-per-view channels.
    #[serde(rename = "isPPV", deserialize_with = "deserialize_lenient_bool", default)]
    pub is_ppv: bool,
    /// Account subscribes to high-definition channels.
    #[serde(rename = "isHD", deserialize_with = "deserialize_lenient_bool", default)]
    pub is_hd: bool,
    /// Numbered account properties (`2002` postal code, `2003` country, `2004` lineup).
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl LoginResponse {
    /// Returns an account property as a string.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).and_then(value_to_string)
    }

    /// Encodes the feature flags as the grid `pref` parameter.
    ///
    /// Example: music + HD → `"m,h"`; no flags → `"-"`.
    #[must_use]
    pub fn preference(&self) -> String {
        let flags: Vec<&str> = [
            (self.is_music, "m"),
            (self.is_ppv, "p"),
            (self.is_hd, "h"),
        ]
        .into_iter()
        .filter_map(|(on, flag)| on.then_some(flag))
        .collect();
        if flags.is_empty() {
            String::from("-")
        } else {
            flags.join(",")
        }
    }
}

/// `api/grid` response for one time window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridResponse {
    /// Channels with their scheduled events.
    #[serde(deserialize_with = "deserialize_skip_invalid", default)]
    pub channels: Vec<GridChannel>,
}

/// A channel within a grid window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridChannel {
    /// Provider channel (station) ID.
    #[serde(rename = "channelId", deserialize_with = "deserialize_lenient_string", default)]
    pub channel_id: Option<String>,
    /// Channel number as displayed (may carry leading zeros).
    #[serde(rename = "channelNo", deserialize_with = "deserialize_lenient_string", default)]
    pub channel_no: Option<String>,
    /// Station call sign.
    #[serde(rename = "callSign", deserialize_with = "deserialize_lenient_string", default)]
    pub call_sign: Option<String>,
    /// Scheduled events, as a list or wrapped in `{"event": [...]}`.
    #[serde(deserialize_with = "deserialize_events", default)]
    pub events: Vec<GridEvent>,
}

/// Accepts either an event list or an object wrapping it under `event`.
fn deserialize_events<'de, D>(deserializer: D) -> Result<Vec<GridEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(mut wrapper)) => collect_valid(wrapper.remove("event")),
        other => collect_valid(other),
    })
}

/// A scheduled event (airing) within a channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridEvent {
    /// Program aired by this event.
    #[serde(default)]
    pub program: Option<GridProgram>,
    /// Duration in seconds.
    #[serde(rename = "durationInSeconds", deserialize_with = "deserialize_lenient_i64", default)]
    pub duration_in_seconds: Option<i64>,
    /// Fallback duration field.
    #[serde(deserialize_with = "deserialize_lenient_i64", default)]
    pub duration: Option<i64>,
    /// Thumbnail asset ID (without extension).
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub thumbnail: Option<String>,
    /// Start time (`%Y-%m-%dT%H:%M:%SZ`).
    #[serde(rename = "startTime", deserialize_with = "deserialize_lenient_string", default)]
    pub start_time: Option<String>,
    /// Alternate start time field.
    #[serde(rename = "startDateTime", deserialize_with = "deserialize_lenient_string", default)]
    pub start_date_time: Option<String>,
    /// End time (`%Y-%m-%dT%H:%M:%SZ`).
    #[serde(rename = "endTime", deserialize_with = "deserialize_lenient_string", default)]
    pub end_time: Option<String>,
    /// Alternate end time field.
    #[serde(rename = "endDateTime", deserialize_with = "deserialize_lenient_string", default)]
    pub end_date_time: Option<String>,
}

impl GridEvent {
    /// Start time, preferring `startTime`.
    #[must_use]
    pub fn start(&self) -> Option<&str> {
        self.start_time
            .as_deref()
            .or(self.start_date_time.as_deref())
    }

    /// End time, preferring `endTime`.
    #[must_use]
    pub fn end(&self) -> Option<&str> {
        self.end_time.as_deref().or(self.end_date_time.as_deref())
    }

    /// Duration in seconds, never negative; `0` when unknown.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        self.duration_in_seconds
            .filter(|d| *d != 0)
            .or(self.duration)
            .unwrap_or(0)
            .max(0)
    }
}

/// Program metadata carried inline by a grid event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridProgram {
    /// Provider program ID (e.g. `EP012345670012`).
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub id: Option<String>,
    /// Program title.
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub title: Option<String>,
    /// Episode title.
    #[serde(rename = "episodeTitle", deserialize_with = "deserialize_lenient_string", default)]
    pub episode_title: Option<String>,
    /// Release year (movies).
    #[serde(rename = "releaseYear", deserialize_with = "deserialize_lenient_string", default)]
    pub release_year: Option<String>,
    /// Season number.
    #[serde(deserialize_with = "deserialize_lenient_i64", default)]
    pub season: Option<i64>,
    /// Episode number.
    #[serde(deserialize_with = "deserialize_lenient_i64", default)]
    pub episode: Option<i64>,
    /// Series ID used for overview enrichment.
    #[serde(rename = "seriesId", deserialize_with = "deserialize_lenient_string", default)]
    pub series_id: Option<String>,
}

/// `api/program/overviewDetails` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewResponse {
    /// Overview tab with the bulk of the metadata.
    #[serde(rename = "overviewTab", default)]
    pub overview_tab: Option<OverviewTab>,
    /// Original air date (top-level variant).
    #[serde(rename = "originalAirDate", deserialize_with = "deserialize_lenient_string", default)]
    pub original_air_date: Option<String>,
    /// Star rating (top-level variant; number or string).
    #[serde(rename = "starRating", default)]
    pub star_rating: Option<Value>,
    /// Content rating (top-level variant).
    #[serde(default)]
    pub rating: Option<RatingField>,
}

/// Overview tab contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewTab {
    /// Long-form description.
    #[serde(rename = "longDescription", deserialize_with = "deserialize_lenient_string", default)]
    pub long_description: Option<String>,
    /// Short-form description.
    #[serde(rename = "shortDescription", deserialize_with = "deserialize_lenient_string", default)]
    pub short_description: Option<String>,
    /// Genres, in ranking order.
    #[serde(deserialize_with = "deserialize_skip_invalid", default)]
    pub genres: Vec<GenreEntry>,
    /// Cast list.
    #[serde(deserialize_with = "deserialize_skip_invalid", default)]
    pub cast: Vec<CastMember>,
    /// Crew list.
    #[serde(deserialize_with = "deserialize_skip_invalid", default)]
    pub crew: Vec<CrewMember>,
    /// Original air date.
    #[serde(rename = "originalAirDate", deserialize_with = "deserialize_lenient_string", default)]
    pub original_air_date: Option<String>,
    /// Star rating (number or string).
    #[serde(rename = "starRating", default)]
    pub star_rating: Option<Value>,
    /// Content rating.
    #[serde(default)]
    pub rating: Option<RatingField>,
}

/// A genre entry: either an object or a bare name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenreEntry {
    /// Structured genre.
    Named {
        /// Genre name.
        #[serde(rename = "genreName", deserialize_with = "deserialize_lenient_string", default)]
        genre_name: Option<String>,
        /// Alternate name field.
        #[serde(deserialize_with = "deserialize_lenient_string", default)]
        title: Option<String>,
    },
    /// Any other scalar.
    Plain(Value),
}

impl GenreEntry {
    /// Genre display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Named { genre_name, title } => genre_name.clone().or_else(|| title.clone()),
            Self::Plain(value) => value_to_string(value),
        }
    }
}

/// A cast credit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastMember {
    /// Role keyword (e.g. `Actor`, `Host`).
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub role: Option<String>,
    /// Alternate role field.
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub billing: Option<String>,
    /// Full name.
    #[serde(rename = "fullName", deserialize_with = "deserialize_lenient_string", default)]
    pub full_name: Option<String>,
    /// Alternate name field.
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub name: Option<String>,
}

impl CastMember {
    /// Person name, preferring `fullName`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.full_name.as_deref().or(self.name.as_deref())
    }
}

/// A crew credit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewMember {
    /// Job title (e.g. `Executive Producer`).
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub job: Option<String>,
    /// Full name.
    #[serde(rename = "fullName", deserialize_with = "deserialize_lenient_string", default)]
    pub full_name: Option<String>,
    /// Alternate name field.
    #[serde(deserialize_with = "deserialize_lenient_string", default)]
    pub name: Option<String>,
}

impl CrewMember {
    /// Person name, preferring `fullName`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.full_name.as_deref().or(self.name.as_deref())
    }
}

/// Content rating, structured or plain.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RatingField {
    /// `{"code": "TV-PG"}` or `{"rating": "TV-PG"}`.
    Structured {
        /// Rating code.
        #[serde(deserialize_with = "deserialize_lenient_string", default)]
        code: Option<String>,
        /// Alternate code field.
        #[serde(deserialize_with = "deserialize_lenient_string", default)]
        rating: Option<String>,
    },
    /// Any other value; only strings are used.
    Plain(Value),
}

impl RatingField {
    /// Rating code, if any.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Structured { code, rating } => code.clone().or_else(|| rating.clone()),
            Self::Plain(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Self::Plain(_) => None,
        }
    }
}

impl OverviewResponse {
    /// Original air date from the tab, falling back to the top level.
    #[must_use]
    pub fn original_air_date(&self) -> Option<&str> {
        self.overview_tab
            .as_ref()
            .and_then(|tab| tab.original_air_date.as_deref())
            .or(self.original_air_date.as_deref())
    }

    /// Star rating coerced to `f64`; non-numeric values are ignored.
    #[must_use]
    pub fn star_rating(&self) -> Option<f64> {
        self.overview_tab
            .as_ref()
            .and_then(|tab| tab.star_rating.as_ref())
            .or(self.star_rating.as_ref())
            .and_then(value_to_f64)
    }

    /// Content rating code from the tab, falling back to the top level.
    #[must_use]
    pub fn rating_code(&self) -> Option<String> {
        self.overview_tab
            .as_ref()
            .and_then(|tab| tab.rating.as_ref())
            .or(self.rating.as_ref())
            .and_then(RatingField::code)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_parse_grid_response() {
        // Arrange
        let json = r#"{
            "channels": [{
                "channelId": "10021",
                "channelNo": "004",
                "callSign": "WABC",
                "events": [{
                    "program": {"id": "EP012345670012", "title": "News", "season": "2", "episode": 7, "seriesId": "SH01234567"},
                    "durationInSeconds": "1800",
                    "thumbnail": "p123_b_h9",
                    "startTime": "2024-01-01T00:00:00Z",
                    "endTime": "2024-01-01T00:30:00Z"
                }]
            }]
        }"#;

        // Act
        let response: GridResponse = serde_json::from_str(json).unwrap();

        // Assert
        let channel = &response.channels[0];
        assert_eq!(channel.channel_id.as_deref(), Some("10021"));
        assert_eq!(channel.channel_no.as_deref(), Some("004"));
        let event = &channel.events[0];
        let program = event.program.as_ref().unwrap();
        assert_eq!(program.season, Some(2));
        assert_eq!(program.episode, Some(7));
        assert_eq!(event.duration_secs(), 1800);
        assert_eq!(event.start(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_parse_wrapped_events_and_alternate_names() {
        // Arrange
        let json = r#"{
            "channels": [{
                "channelId": 55,
                "channelNo": 2,
                "events": {"event": [{
                    "program": {"id": "MV000000010000"},
                    "duration": 600,
                    "startDateTime": "2024-01-01T03:00:00Z"
                }]}
            }]
        }"#;

        // Act
        let response: GridResponse = serde_json::from_str(json).unwrap();

        // Assert
        let channel = &response.channels[0];
        assert_eq!(channel.channel_id.as_deref(), Some("55"));
        assert_eq!(channel.events.len(), 1);
        assert_eq!(channel.events[0].start(), Some("2024-01-01T03:00:00Z"));
        assert_eq!(channel.events[0].end(), None);
        assert_eq!(channel.events[0].duration_secs(), 600);
    }

    #[test]
    fn test_negative_duration_clamped_to_zero() {
        // Arrange
        let event: GridEvent = serde_json::from_str(r#"{"durationInSeconds": -30}"#).unwrap();

        // Act & Assert
        assert_eq!(event.duration_secs(), 0);
    }

    #[test]
    fn test_login_preference_string() {
        // Arrange
        let login: LoginResponse = serde_json::from_str(
            r#"{"token": "abc", "isMusic": true, "isHD": true, "properties": {"2002": 10001, "2004": "DITV:X"}}"#,
        )
        .unwrap();
        let plain = LoginResponse::default();

        // Act & Assert
        assert_eq!(login.preference(), "m,h");
        assert_eq!(login.property("2002").as_deref(), Some("10001"));
        assert_eq!(login.property("2004").as_deref(), Some("DITV:X"));
        assert_eq!(plain.preference(), "-");
    }

    #[test]
    fn test_overview_field_fallbacks() {
        // Arrange
        let json = r#"{
            "overviewTab": {
                "genres": [{"genreName": "Drama"}, "Comedy", 5],
                "cast": [{"role": "Actor", "fullName": "A"}, null],
                "starRating": "3.5",
                "rating": {"code": "TV-14"}
            },
            "originalAirDate": "2020-01-15"
        }"#;

        // Act
        let overview: OverviewResponse = serde_json::from_str(json).unwrap();

        // Assert
        let tab = overview.overview_tab.as_ref().unwrap();
        let names: Vec<Option<String>> = tab.genres.iter().map(GenreEntry::name).collect();
        assert_eq!(
            names,
            vec![
                Some(String::from("Drama")),
                Some(String::from("Comedy")),
                Some(String::from("5"))
            ]
        );
        assert_eq!(tab.cast.len(), 1);
        assert_eq!(overview.star_rating(), Some(3.5));
        assert_eq!(overview.rating_code().as_deref(), Some("TV-14"));
        assert_eq!(overview.original_air_date(), Some("2020-01-15"));
    }

    #[test]
    fn test_plain_rating_string() {
        // Arrange
        let overview: OverviewResponse =
            serde_json::from_str(r#"{"rating": "PG-13", "starRating": "n/a"}"#).unwrap();

        // Act & Assert
        assert_eq!(overview.rating_code().as_deref(), Some("PG-13"));
        assert_eq!(overview.star_rating(), None);
    }
}
