//! Engine options contract.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

/// Where the finished document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output (`-`).
    Stdout,
    /// A file path.
    File(PathBuf),
}

/// Character encoding of the output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum OutputEncoding {
    /// UTF-8.
    #[serde(rename = "utf-8", alias = "UTF-8", alias = "utf8")]
    Utf8,
    /// ISO-8859-1; characters outside Latin-1 are dropped.
    #[default]
    #[serde(rename = "iso-8859-1", alias = "ISO-8859-1", alias = "latin1")]
    Latin1,
}

impl OutputEncoding {
    /// Label written into the XML declaration.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            other => bail!("unsupported output encoding: {other}"),
        }
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which of the five predefined XML entities are escaped in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
#[allow(clippy::struct_excessive_bools)]
pub struct EntitySet {
    /// `&` → `&amp;`
    pub amp: bool,
    /// `"` → `&quot;`
    pub quot: bool,
    /// `'` → `&apos;`
    pub apos: bool,
    /// `<` → `&lt;`
    pub lt: bool,
    /// `>` → `&gt;`
    pub gt: bool,
}

impl EntitySet {
    /// Every entity escaped.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            amp: true,
            quot: true,
            apos: true,
            lt: true,
            gt: true,
        }
    }

    /// No entity escaped.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            amp: false,
            quot: false,
            apos: false,
            lt: false,
            gt: false,
        }
    }
}

impl Default for EntitySet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for EntitySet {
    type Err = anyhow::Error;

    /// Parses a comma list such as `amp,lt,gt`.
    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::none();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name {
                "amp" => set.amp = true,
                "quot" => set.quot = true,
                "apos" => set.apos = true,
                "lt" => set.lt = true,
                "gt" => set.gt = true,
                other => bail!("unknown XML entity: {other}"),
            }
        }
        Ok(set)
    }
}

impl TryFrom<String> for EntitySet {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Options for one grab run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineOptions {
    /// Number of days to fetch.
    pub days: u32,
    /// Days to skip before the first window.
    pub day_offset: u32,
    /// Align windows on the UTC clock instead of local time.
    pub use_utc: bool,
    /// Fetch per-series overview details.
    pub enrich: bool,
    /// Account email.
    pub username: Option<String>,
    /// Account password.
    pub password: Option<String>,
    /// Lineup ID for anonymous access.
    pub lineup_id: Option<String>,
    /// Postal/zip code for anonymous access.
    pub postal_code: Option<String>,
    /// Output path; `-` writes to standard output.
    pub output: String,
    /// Output character encoding.
    pub encoding: OutputEncoding,
    /// Minutes added to every rendered start/stop time.
    pub time_shift_minutes: i64,
    /// Language code for text elements.
    pub lang: String,
    /// Entities escaped in text.
    pub escapes: EntitySet,
    /// Replace characters outside printable ASCII with numeric references.
    pub numeric_entities: bool,
    /// Seconds slept before every request.
    pub delay: f64,
    /// Attempts per request (clamped to `1..=20` by the client).
    pub max_retries: u32,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Cache directory.
    pub cache_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            days: 7,
            day_offset: 0,
            use_utc: false,
            enrich: false,
            username: None,
            password: None,
            lineup_id: None,
            postal_code: None,
            output: String::from("xmltv.xml"),
            encoding: OutputEncoding::default(),
            time_shift_minutes: 0,
            lang: String::from("en"),
            escapes: EntitySet::all(),
            numeric_entities: false,
            delay: 0.0,
            max_retries: 3,
            proxy: None,
            cache_dir: PathBuf::from("cache"),
        }
    }
}

impl EngineOptions {
    /// Resolves the output target.
    #[must_use]
    pub fn output_target(&self) -> OutputTarget {
        if self.output == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(&self.output))
        }
    }

    /// Inter-request delay; negative or non-finite values mean none.
    #[must_use]
    pub fn delay_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::ZERO)
    }
}
