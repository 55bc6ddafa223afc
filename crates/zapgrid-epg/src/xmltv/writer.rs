//! XMLTV document writer.

use std::fmt::Display;

use anyhow::{Context, Result};
use chrono::TimeZone;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::episode;
use super::escape::escape_text;
use super::time::{format_air_date, format_xmltv_time};
use crate::model::{CreditRole, Program, Schedule, ScheduleSlot, Station};
use crate::options::{EntitySet, OutputEncoding};

const SOURCE_INFO_URL: &str = "http://tvlistings.zap2it.com/";
const SOURCE_INFO_NAME: &str = "zap2it.com";
const GENERATOR_NAME: &str = "zapgrid";
const GENERATOR_URL: &str = "https://github.com/naa0yama/zapgrid";

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmltvOptions {
    /// Output encoding.
    pub encoding: OutputEncoding,
    /// `lang` attribute of text elements.
    pub lang: String,
    /// Entities escaped in text.
    pub escapes: EntitySet,
    /// Numeric character references for non-ASCII text.
    pub numeric_entities: bool,
    /// Minutes added to start/stop wall-clock times.
    pub time_shift_minutes: i64,
}

impl Default for XmltvOptions {
    fn default() -> Self {
        Self {
            encoding: OutputEncoding::default(),
            lang: String::from("en"),
            escapes: EntitySet::all(),
            numeric_entities: false,
            time_shift_minutes: 0,
        }
    }
}

/// XMLTV channel ID of a station.
#[must_use]
pub fn channel_id(station: &Station) -> String {
    format!("I{}.{}.zap2it.com", station.number, station.id)
}

/// Resolves a slot's stop time: its explicit end, else the next slot's start.
///
/// There is no `start + duration` fallback here, even when the program
/// carries a duration. Parsing derives a missing end from the event's own
/// duration; a slot that still has no end and no successor is dropped
/// rather than estimated.
#[must_use]
pub fn resolve_end(slot: &ScheduleSlot, next: Option<&ScheduleSlot>) -> Option<i64> {
    slot.end_ms.or_else(|| next.map(|n| n.start_ms))
}

/// Renders the schedule as an XMLTV document in the configured encoding.
///
/// Times are rendered on the clock of `tz`.
///
/// # Errors
///
/// Returns an error if writing to the in-memory buffer fails.
pub fn render<Tz: TimeZone>(schedule: &Schedule, options: &XmltvOptions, tz: &Tz) -> Result<Vec<u8>>
where
    Tz::Offset: Display,
{
    let mut doc = Document {
        writer: Writer::new_with_indent(Vec::new(), b'\t', 1),
        options,
    };

    doc.event(Event::Decl(BytesDecl::new(
        "1.0",
        Some(options.encoding.label()),
        None,
    )))?;
    doc.event(Event::DocType(BytesText::from_escaped(
        r#"tv SYSTEM "xmltv.dtd""#,
    )))?;
    let tv = BytesStart::new("tv").with_attributes([
        ("source-info-url", SOURCE_INFO_URL),
        ("source-info-name", SOURCE_INFO_NAME),
        ("generator-info-name", GENERATOR_NAME),
        ("generator-info-url", GENERATOR_URL),
    ]);
    doc.event(Event::Start(tv))?;

    let stations = schedule.stations_in_order();
    for (_, station) in &stations {
        doc.channel(station)?;
    }

    let mut dropped = 0_usize;
    for (key, station) in &stations {
        let slots: Vec<&ScheduleSlot> = schedule.slots(key).collect();
        for (index, slot) in slots.iter().enumerate() {
            let next = index.checked_add(1).and_then(|i| slots.get(i)).copied();
            let Some(end_ms) = resolve_end(slot, next) else {
                dropped = dropped.saturating_add(1);
                continue;
            };
            let program = schedule.program(&slot.program_id);
            if !doc.programme(station, slot, end_ms, program, tz)? {
                dropped = dropped.saturating_add(1);
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "Dropped slots without a resolvable stop time");
    }

    doc.event(Event::End(BytesEnd::new("tv")))?;

    let mut bytes = doc.writer.into_inner();
    bytes.push(b'\n');
    Ok(match options.encoding {
        OutputEncoding::Utf8 => bytes,
        OutputEncoding::Latin1 => to_latin1(&bytes),
    })
}

/// Transcodes UTF-8 to ISO-8859-1, dropping characters it cannot hold.
fn to_latin1(utf8: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(utf8)
        .chars()
        .filter_map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

/// `drama` → `Drama`.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Python-style float rendering: `3.0`, `3.5`.
fn format_star_rating(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

struct Document<'o> {
    writer: Writer<Vec<u8>>,
    options: &'o XmltvOptions,
}

impl Document<'_> {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .context("failed to write XMLTV event")
    }

    /// Writes `<tag attrs>escaped text</tag>`.
    fn text_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        let escaped = escape_text(text, self.options.escapes, self.options.numeric_entities);
        let start = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.event(Event::Start(start))?;
        self.event(Event::Text(BytesText::from_escaped(escaped)))?;
        self.event(Event::End(BytesEnd::new(tag)))
    }

    /// Writes a text element carrying the configured `lang`.
    fn lang_element(&mut self, tag: &str, text: &str) -> Result<()> {
        let lang = self.options.lang.clone();
        self.text_element(tag, &[("lang", lang.as_str())], text)
    }

    /// Writes `<tag><value>text</value></tag>`.
    fn value_element(&mut self, tag: &str, value: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(tag)))?;
        self.text_element("value", &[], value)?;
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn channel(&mut self, station: &Station) -> Result<()> {
        let id = channel_id(station);
        self.event(Event::Start(
            BytesStart::new("channel").with_attributes([("id", id.as_str())]),
        ))?;
        if !station.number.is_empty() {
            self.text_element(
                "display-name",
                &[],
                &format!("{} {}", station.number, station.name),
            )?;
            self.text_element("display-name", &[], &station.number)?;
        }
        if !station.name.is_empty() {
            self.text_element("display-name", &[], &station.name)?;
        }
        self.event(Event::End(BytesEnd::new("channel")))
    }

    /// Writes one programme; returns `false` when its times are unrenderable.
    fn programme<Tz: TimeZone>(
        &mut self,
        station: &Station,
        slot: &ScheduleSlot,
        end_ms: i64,
        program: Option<&Program>,
        tz: &Tz,
    ) -> Result<bool>
    where
        Tz::Offset: Display,
    {
        let shift = self.options.time_shift_minutes;
        let (Some(start), Some(stop)) = (
            format_xmltv_time(slot.start_ms, shift, tz),
            format_xmltv_time(end_ms, shift, tz),
        ) else {
            return Ok(false);
        };

        let channel = channel_id(station);
        self.event(Event::Start(BytesStart::new("programme").with_attributes([
            ("start", start.as_str()),
            ("stop", stop.as_str()),
            ("channel", channel.as_str()),
        ])))?;

        let empty = Program::default();
        let program = program.unwrap_or(&empty);

        if let Some(ref title) = program.title {
            self.lang_element("title", title)?;
        }
        if let Some(ref sub_title) = program.episode_title {
            self.lang_element("sub-title", sub_title)?;
        }
        if let Some(ref desc) = program.description {
            self.lang_element("desc", desc)?;
        }
        self.credits(program)?;

        let date = program.release_year.clone().or_else(|| {
            program
                .original_air_date
                .as_deref()
                .and_then(format_air_date)
        });
        if let Some(date) = date {
            self.text_element("date", &[], &date)?;
        }

        let mut genres: Vec<(&String, &usize)> = program.genres.iter().collect();
        genres.sort_by(|(na, ra), (nb, rb)| ra.cmp(rb).then_with(|| na.cmp(nb)));
        for (name, _) in genres {
            self.lang_element("category", &capitalize(name))?;
        }

        if let Some(secs) = program.duration_secs.filter(|d| *d > 0) {
            let minutes = (secs / 60).to_string();
            self.text_element("length", &[("units", "minutes")], &minutes)?;
        }

        if let Some(ref url) = program.image_url {
            self.event(Event::Empty(
                BytesStart::new("icon").with_attributes([("src", url.as_str())]),
            ))?;
        }

        if let Some(common) = episode::common(program.season, program.episode) {
            self.text_element("episode-num", &[("system", "common")], &common)?;
        }
        self.text_element(
            "episode-num",
            &[("system", "dd_progid")],
            &episode::dd_progid(&slot.program_id),
        )?;
        if let Some(ns) = episode::xmltv_ns(program.season, program.episode) {
            self.text_element("episode-num", &[("system", "xmltv_ns")], &ns)?;
        }

        if let Some(ref rating) = program.rating {
            self.value_element("rating", rating)?;
        }
        if let Some(stars) = program.star_rating {
            self.value_element("star-rating", &format!("{}/4", format_star_rating(stars)))?;
        }

        self.event(Event::End(BytesEnd::new("programme")))?;
        Ok(true)
    }

    fn credits(&mut self, program: &Program) -> Result<()> {
        if program.credits.is_empty() {
            return Ok(());
        }
        self.event(Event::Start(BytesStart::new("credits")))?;
        for role in CreditRole::ALL {
            for name in program.credits.get(role) {
                self.text_element(role.tag(), &[], name)?;
            }
        }
        self.event(Event::End(BytesEnd::new("credits")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use serde::Deserialize;

    use super::*;
    use crate::model::StationKey;

    const HOUR_MS: i64 = 3_600_000;

    fn utf8_options() -> XmltvOptions {
        XmltvOptions {
            encoding: OutputEncoding::Utf8,
            ..XmltvOptions::default()
        }
    }

    fn render_utf8(schedule: &Schedule, options: &XmltvOptions) -> String {
        String::from_utf8(render(schedule, options, &Utc).unwrap()).unwrap()
    }

    fn single_station(schedule: &mut Schedule) -> StationKey {
        let key = StationKey::new("004", "10001");
        schedule.upsert_station(key.clone(), "10001", "WAAA", "004");
        key
    }

    fn add_slot(schedule: &mut Schedule, key: &StationKey, start_ms: i64, end_ms: Option<i64>, id: &str) {
        schedule.upsert_slot(ScheduleSlot {
            start_ms,
            end_ms,
            program_id: String::from(id),
            station: key.clone(),
        });
    }

    #[derive(Debug, Deserialize)]
    struct Tv {
        #[serde(default)]
        channel: Vec<Channel>,
        #[serde(default)]
        programme: Vec<Programme>,
    }

    #[derive(Debug, Deserialize)]
    struct Channel {
        #[serde(rename = "display-name", default)]
        display_names: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Programme {
        title: Option<LangText>,
        desc: Option<LangText>,
        #[serde(default)]
        category: Vec<LangText>,
    }

    #[derive(Debug, Deserialize)]
    struct LangText {
        #[serde(rename = "@lang")]
        lang: String,
        #[serde(rename = "$text")]
        text: String,
    }

    fn parse_tv(xml: &str) -> Tv {
        quick_xml::de::from_str(xml).unwrap()
    }

    #[test]
    fn test_header_and_channel() {
        // Arrange
        let mut schedule = Schedule::new();
        single_station(&mut schedule);

        // Act
        let xml = render_utf8(&schedule, &utf8_options());

        // Assert
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<!DOCTYPE tv SYSTEM "xmltv.dtd">"#));
        assert!(xml.contains(r#"source-info-name="zap2it.com""#));
        assert!(xml.contains(r#"<channel id="I4.10001.zap2it.com">"#));
        let tv = parse_tv(&xml);
        assert_eq!(
            tv.channel.first().unwrap().display_names,
            ["4 WAAA", "4", "WAAA"]
        );
        assert!(xml.ends_with("</tv>\n"));
    }

    #[test]
    fn test_episode_numbers_without_enrichment() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        let program = schedule.program_mut("EP012345670005");
        program.title = Some(String::from("Show"));
        program.season = Some(1);
        program.episode = Some(5);
        add_slot(&mut schedule, &key, 0, Some(HOUR_MS), "EP012345670005");

        // Act
        let xml = render_utf8(&schedule, &utf8_options());

        // Assert
        assert!(xml.contains(r#"<episode-num system="common">S01E05</episode-num>"#));
        assert!(xml.contains(r#"<episode-num system="xmltv_ns">0.4.</episode-num>"#));
        assert!(xml.contains(r#"<episode-num system="dd_progid">EP01234567.0005</episode-num>"#));
        assert!(!xml.contains("<sub-title"));
        assert!(!xml.contains("<desc"));
        assert!(xml.contains(r#"start="19700101000000 +0000" stop="19700101010000 +0000""#));
    }

    #[test]
    fn test_final_slot_without_end_is_dropped() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        schedule.program_mut("A").duration_secs = Some(1800);
        schedule.program_mut("B").duration_secs = Some(1800);
        add_slot(&mut schedule, &key, 0, None, "A");
        add_slot(&mut schedule, &key, HOUR_MS, None, "B");

        // Act
        let xml = render_utf8(&schedule, &utf8_options());

        // Assert: A ends where B starts; B has no stop time
        assert_eq!(xml.matches("<programme ").count(), 1);
        assert!(xml.contains(r#"stop="19700101010000 +0000""#));
        assert!(!xml.contains(r#"dd_progid">B<"#));
    }

    #[test]
    fn test_escaping_round_trip() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        let title = r#"Tom & "Jerry's" <Cat> Café"#;
        let desc = "a < b && c > 'd'";
        let program = schedule.program_mut("EP1");
        program.title = Some(String::from(title));
        program.description = Some(String::from(desc));
        add_slot(&mut schedule, &key, 0, Some(HOUR_MS), "EP1");

        // Act
        let plain = render_utf8(&schedule, &utf8_options());
        let numeric = render_utf8(
            &schedule,
            &XmltvOptions {
                numeric_entities: true,
                ..utf8_options()
            },
        );

        // Assert
        let plain_tv = parse_tv(&plain);
        let programme = plain_tv.programme.first().unwrap();
        let parsed_title = programme.title.as_ref().unwrap();
        assert_eq!(parsed_title.text, title);
        assert_eq!(parsed_title.lang, "en");
        assert_eq!(programme.desc.as_ref().unwrap().text, desc);
        let numeric_tv = parse_tv(&numeric);
        let numeric_title = numeric_tv.programme.first().unwrap().title.as_ref().unwrap();
        assert_eq!(numeric_title.text, title);
        assert!(numeric.contains("Caf&#233;"));
    }

    #[test]
    fn test_element_order_and_details() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        let program = schedule.program_mut("MV0001234500001");
        program.title = Some(String::from("Movie"));
        program.episode_title = Some(String::from("Part 1"));
        program.description = Some(String::from("Desc"));
        program.release_year = Some(String::from("1999"));
        program.original_air_date = Some(String::from("20010101"));
        program.duration_secs = Some(5400);
        program.genres.insert(String::from("sci-fi"), 2);
        program.genres.insert(String::from("action"), 1);
        program.credits.push(CreditRole::Actor, "Ann");
        program.credits.push(CreditRole::Director, "Dee");
        program.image_url = Some(String::from("https://img/x.jpg?a=1&b=2"));
        program.rating = Some(String::from("PG-13"));
        program.star_rating = Some(3.0);
        add_slot(&mut schedule, &key, 0, Some(HOUR_MS), "MV0001234500001");

        // Act
        let xml = render_utf8(&schedule, &utf8_options());

        // Assert
        let order = [
            "<title", "<sub-title", "<desc", "<credits", "<date>1999", "<category",
            "<length", "<icon", "<episode-num", "<rating", "<star-rating",
        ];
        let positions: Vec<usize> = order.iter().map(|tag| xml.find(tag).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        let tv = parse_tv(&xml);
        let categories: Vec<&str> = tv
            .programme
            .first()
            .unwrap()
            .category
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(categories, ["Action", "Sci-fi"]);
        assert!(xml.find("<director>").unwrap() < xml.find("<actor>").unwrap());
        assert!(xml.contains(r#"<length units="minutes">90</length>"#));
        assert!(xml.contains(r#"src="https://img/x.jpg?a=1&amp;b=2""#));
        assert!(xml.contains("<value>3.0/4</value>"));
        assert!(xml.contains("</star-rating>"));
        assert!(!xml.contains(r#"system="common""#));
    }

    #[test]
    fn test_air_date_fallback() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        schedule.program_mut("EP1").original_air_date = Some(String::from("20190512000000"));
        add_slot(&mut schedule, &key, 0, Some(HOUR_MS), "EP1");

        // Act
        let xml = render_utf8(&schedule, &utf8_options());

        // Assert
        assert!(xml.contains("<date>20190512</date>"));
    }

    #[test]
    fn test_latin1_output() {
        // Arrange
        let mut schedule = Schedule::new();
        let key = single_station(&mut schedule);
        schedule.program_mut("EP1").title = Some(String::from("Café ☃"));
        add_slot(&mut schedule, &key, 0, Some(HOUR_MS), "EP1");

        // Act
        let bytes = render(&schedule, &XmltvOptions::default(), &Utc).unwrap();

        // Assert
        let header = br#"<?xml version="1.0" encoding="ISO-8859-1"?>"#;
        assert!(bytes.starts_with(header));
        assert!(bytes.windows(5).any(|w| w == b"Caf\xe9 "));
        assert!(!bytes.windows(3).any(|w| w == "☃".as_bytes()));
    }

    #[test]
    fn test_station_order_is_stable() {
        // Arrange
        let mut forward = Schedule::new();
        let mut reverse = Schedule::new();
        let stations = [("2", "20"), ("10", "100"), ("2", "19")];
        for (no, id) in stations {
            forward.upsert_station(StationKey::new(no, id), id, "S", no);
        }
        for (no, id) in stations.iter().rev() {
            reverse.upsert_station(StationKey::new(no, id), id, "S", no);
        }

        // Act
        let a = render_utf8(&forward, &utf8_options());
        let b = render_utf8(&reverse, &utf8_options());

        // Assert
        assert_eq!(a, b);
        let first = a.find("I2.19.").unwrap();
        let second = a.find("I2.20.").unwrap();
        let third = a.find("I10.100.").unwrap();
        assert!(first < second && second < third);
    }
}
