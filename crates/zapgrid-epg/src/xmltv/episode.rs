//! Episode numbering systems.

use std::sync::LazyLock;

use regex::Regex;

/// Content-type/date prefix and sequence suffix of a provider program ID.
#[allow(clippy::expect_used)]
static DD_PROGID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(..\d{8})(\d{4})").expect("valid regex"));

/// `S01E05` when both numbers are known.
#[must_use]
pub fn common(season: Option<i64>, episode: Option<i64>) -> Option<String> {
    let (season, episode) = (season?, episode?);
    Some(format!("S{season:02}E{episode:02}"))
}

/// Zero-based `0.4.` when both numbers are known and at least 1.
#[must_use]
pub fn xmltv_ns(season: Option<i64>, episode: Option<i64>) -> Option<String> {
    let season = season?.checked_sub(1).filter(|s| *s >= 0)?;
    let episode = episode?.checked_sub(1).filter(|e| *e >= 0)?;
    Some(format!("{season}.{episode}."))
}

/// Re-encodes a program ID as `EP01234567.0005`.
///
/// IDs that do not start with two characters, eight digits and four
/// digits are returned unchanged.
#[must_use]
pub fn dd_progid(program_id: &str) -> String {
    DD_PROGID_RE.captures(program_id).map_or_else(
        || String::from(program_id),
        |caps| {
            let prefix = caps.get(1).map_or("", |m| m.as_str());
            let suffix = caps.get(2).map_or("", |m| m.as_str());
            format!("{prefix}.{suffix}")
        },
    )
}
