//! In-memory schedule model built during a crawl.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Station key: `{channel_no}.{channel_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationKey(String);

impl StationKey {
    /// Builds the key from the grid's channel number and channel ID.
    #[must_use]
    pub fn new(channel_no: &str, channel_id: &str) -> Self {
        Self(format!("{channel_no}.{channel_id}"))
    }

    /// Key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A broadcast station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    /// Provider station ID.
    pub id: String,
    /// Call sign, updated on every sighting.
    pub name: String,
    /// Display number without leading zeros, updated on every sighting.
    pub number: String,
    /// Sort order, fixed at first sighting.
    order: String,
}

impl Station {
    /// Sort order assigned when the station was first seen.
    #[must_use]
    pub fn order(&self) -> &str {
        &self.order
    }
}

/// Contributor roles, in XMLTV `credits` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreditRole {
    /// `director`
    Director,
    /// `actor`
    Actor,
    /// `writer`
    Writer,
    /// `producer`
    Producer,
    /// `presenter`
    Presenter,
    /// `guest`
    Guest,
}

impl CreditRole {
    /// Every role in XMLTV element order.
    pub const ALL: [Self; 6] = [
        Self::Director,
        Self::Actor,
        Self::Writer,
        Self::Producer,
        Self::Presenter,
        Self::Guest,
    ];

    /// XMLTV element name.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Writer => "writer",
            Self::Producer => "producer",
            Self::Presenter => "presenter",
            Self::Guest => "guest",
        }
    }

    /// Buckets a cast billing role; unknown roles become `Guest`.
    #[must_use]
    pub fn from_cast_role(role: &str) -> Self {
        match role.trim().to_lowercase().as_str() {
            "actor" | "actress" | "voice" | "voice actor" | "voice talent" => Self::Actor,
            "host" | "presenter" => Self::Presenter,
            "director" | "dir" => Self::Director,
            "producer" | "exec producer" | "executive producer" => Self::Producer,
            "writer" | "screenplay" | "screenwriter" => Self::Writer,
            _ => Self::Guest,
        }
    }

    /// Buckets a crew job title by substring; other jobs are not credited.
    #[must_use]
    pub fn from_crew_job(job: &str) -> Option<Self> {
        let job = job.to_lowercase();
        if job.contains("director") {
            Some(Self::Director)
        } else if job.contains("producer") {
            Some(Self::Producer)
        } else if job.contains("writer") || job.contains("screen") {
            Some(Self::Writer)
        } else {
            None
        }
    }
}

/// Contributor lists; appended to without deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits {
    lists: HashMap<CreditRole, Vec<String>>,
}

impl Credits {
    /// Appends a contributor.
    pub fn push(&mut self, role: CreditRole, name: impl Into<String>) {
        self.lists.entry(role).or_default().push(name.into());
    }

    /// Contributors for one role.
    #[must_use]
    pub fn get(&self, role: CreditRole) -> &[String] {
        self.lists.get(&role).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` when no contributor is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.values().all(Vec::is_empty)
    }
}

/// A program (show, episode or movie).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Title.
    pub title: Option<String>,
    /// Episode title.
    pub episode_title: Option<String>,
    /// Duration in seconds.
    pub duration_secs: Option<i64>,
    /// Release year (movies).
    pub release_year: Option<String>,
    /// Season number.
    pub season: Option<i64>,
    /// Episode number.
    pub episode: Option<i64>,
    /// Fully qualified image URL.
    pub image_url: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Lowercased genre name → 1-based first-seen rank.
    pub genres: HashMap<String, usize>,
    /// Contributors.
    pub credits: Credits,
    /// Original air date, digits only.
    pub original_air_date: Option<String>,
    /// Star rating out of 4.
    pub star_rating: Option<f64>,
    /// Content rating code.
    pub rating: Option<String>,
}

/// Overwrites `slot` only when `value` is present.
pub fn merge_if_present<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// One airing on a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    /// Start as epoch milliseconds.
    pub start_ms: i64,
    /// Explicit end as epoch milliseconds.
    pub end_ms: Option<i64>,
    /// Program aired.
    pub program_id: String,
    /// Station aired on.
    pub station: StationKey,
}

/// First window start and last window end of a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Start of the first window (epoch ms).
    pub start_ms: Option<i64>,
    /// Last millisecond of the last scheduled window (epoch ms).
    pub end_ms: Option<i64>,
}

/// Aggregate schedule for one run.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    stations: HashMap<StationKey, Station>,
    programs: HashMap<String, Program>,
    slots: HashMap<StationKey, BTreeMap<i64, ScheduleSlot>>,
    /// Crawl coverage markers.
    pub coverage: Coverage,
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a station sighting.
    ///
    /// Name and number always take the latest values; the sort order is
    /// set from the number on first sighting only.
    pub fn upsert_station(&mut self, key: StationKey, id: &str, name: &str, channel_no: &str) {
        let number = channel_no.trim_start_matches('0');
        let station = self.stations.entry(key).or_insert_with(|| Station {
            id: String::new(),
            name: String::new(),
            number: String::new(),
            order: String::from(number),
        });
        station.id = String::from(id);
        station.name = String::from(name);
        station.number = String::from(number);
    }

    /// Looks up a station.
    #[must_use]
    pub fn station(&self, key: &StationKey) -> Option<&Station> {
        self.stations.get(key)
    }

    /// Program record, created on first reference.
    pub fn program_mut(&mut self, id: &str) -> &mut Program {
        self.programs.entry(String::from(id)).or_default()
    }

    /// Looks up a program.
    #[must_use]
    pub fn program(&self, id: &str) -> Option<&Program> {
        self.programs.get(id)
    }

    /// Inserts or replaces the slot at `(station, start)`.
    pub fn upsert_slot(&mut self, slot: ScheduleSlot) {
        self.slots
            .entry(slot.station.clone())
            .or_default()
            .insert(slot.start_ms, slot);
    }

    /// Slots of a station in ascending start order.
    pub fn slots(&self, key: &StationKey) -> impl Iterator<Item = &ScheduleSlot> {
        self.slots.get(key).into_iter().flat_map(BTreeMap::values)
    }

    /// Stations ordered by (sort order, station ID), both compared naturally.
    #[must_use]
    pub fn stations_in_order(&self) -> Vec<(&StationKey, &Station)> {
        let mut stations: Vec<_> = self.stations.iter().collect();
        stations.sort_by(|(ka, a), (kb, b)| {
            natural_cmp(&a.order, &b.order)
                .then_with(|| natural_cmp(&a.id, &b.id))
                .then_with(|| ka.cmp(kb))
        });
        stations
    }

    /// Number of stations.
    #[must_use]
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Number of programs.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Number of schedule slots across all stations.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.values().map(BTreeMap::len).sum()
    }
}

/// Compares strings treating digit runs as numbers (`"9" < "10"`).
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        let ord = match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let l = take_digits(&mut left);
                let r = take_digits(&mut right);
                let (l, r) = (l.trim_start_matches('0'), r.trim_start_matches('0'));
                l.len().cmp(&r.len()).then_with(|| l.cmp(r))
            }
            (Some(x), Some(y)) => {
                left.next();
                right.next();
                x.cmp(&y)
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}
