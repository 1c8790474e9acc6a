//! Cell text to [`ClassEvent`].
//!
//! A schedule row reads, cell by cell:
//!
//! ```text
//! ["", "6:15 AM – 7:15 AM\n1 hour", "Power Flow w/ Emma", "Seattle Poplar",
//!  "4 Pricing Options Available\n35/36 left"]
//! ```
//!
//! The first cell holds the class picture and is ignored.

use chrono::NaiveTime;
use gymcal_core::ClassEvent;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PortalError, PortalResult};

const TIME_CELL: usize = 1;
const NAME_CELL: usize = 2;
const LOCATION_CELL: usize = 3;
const AVAILABILITY_CELL: usize = 4;

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*([ap])\.?m\.?$").expect("valid clock regex")
});

/// Start and end anywhere in the text; tolerates a suffix glued to the end time.
static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}:\d{2}\s*[ap]m)\s*(?:–|—|-)\s*(\d{1,2}:\d{2}\s*[ap]m)")
        .expect("valid range regex")
});

static AVAILABILITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)/\d+ left").expect("valid availability regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
}

/// Build an event from one row's cell texts.
pub fn parse_row(cells: &[String]) -> PortalResult<ClassEvent> {
    let cell = |i: usize| {
        cells
            .get(i)
            .map(|s| s.trim())
            .ok_or_else(|| PortalError::parse(&cells.join(" | "), "missing cell"))
    };

    let range = parse_time_range(cell(TIME_CELL)?)?;
    let name = cell(NAME_CELL)?;
    if name.is_empty() {
        return Err(PortalError::parse(&cells.join(" | "), "empty class name"));
    }

    Ok(ClassEvent {
        name: name.to_string(),
        location: cell(LOCATION_CELL)?.to_string(),
        start_time: range.start,
        end_time: range.end,
        available_spots: parse_availability(cell(AVAILABILITY_CELL)?),
        detail_url: None,
    })
}

/// Parse `"6:15 AM – 7:15 AM\n1 hour"`, `"6:15 AM – 7:15 AM15 minutes"` or
/// `"6:15 AM"`.
pub fn parse_time_range(text: &str) -> PortalResult<TimeRange> {
    if let Some(range) = split_range(text) {
        return Ok(range);
    }

    if let Some(caps) = RANGE_RE.captures(text) {
        let start = parse_clock(&caps[1]);
        let end = parse_clock(&caps[2]);
        if let (Some(start), Some(end)) = (start, end) {
            return Ok(TimeRange {
                start,
                end: Some(end),
            });
        }
    }

    Err(PortalError::parse(text, "unrecognised time range"))
}

/// Dash-separated range where the end time is the first line after the dash.
fn split_range(text: &str) -> Option<TimeRange> {
    let Some((start_side, rest)) = split_dash(text) else {
        let start = parse_clock(text.lines().next()?.trim())?;
        return Some(TimeRange { start, end: None });
    };

    let start = parse_clock(start_side.trim())?;
    let end = parse_clock(rest.lines().next()?.trim())?;
    Some(TimeRange {
        start,
        end: Some(end),
    })
}

fn split_dash(text: &str) -> Option<(&str, &str)> {
    [" - ", "–", "—"]
        .iter()
        .filter_map(|dash| text.find(dash).map(|at| (at, dash.len())))
        .min_by_key(|(at, _)| *at)
        .map(|(at, len)| (&text[..at], &text[at + len..]))
}

/// 12-hour clock time, AM/PM in any case, with or without a space.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(text.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }

    let pm = caps[3].eq_ignore_ascii_case("p");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// `"35/36 left"` gives 35. No match means unknown, not zero.
pub fn parse_availability(text: &str) -> Option<u32> {
    AVAILABILITY_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}
