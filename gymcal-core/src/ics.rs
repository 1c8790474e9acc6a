//! Per-location `.ics` export.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, Component, EventLike};
use tracing::info;

use crate::body::EventBody;
use crate::error::{GymCalError, GymCalResult};
use crate::event::EventsByDate;
use crate::key::EventKey;
use crate::sync::calendar_name;

/// Write one calendar file per location in `schedule` into `dir`.
///
/// Events go through the same validation as a sync, so a location with a
/// row missing its end time fails the whole export.
pub fn write_location_calendars(
    schedule: &EventsByDate,
    prefix: &str,
    tz: Tz,
    dir: &Path,
) -> GymCalResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (location, events) in schedule.by_location() {
        let bodies = events
            .iter()
            .map(|(date, event)| EventBody::from_class(*date, event, tz))
            .collect::<GymCalResult<Vec<_>>>()?;

        let name = calendar_name(prefix, location);
        let ics = generate_calendar(&name, tz, &bodies)?;

        let path = dir.join(file_name(location));
        fs::write(&path, ics)?;
        info!(location, path = %path.display(), events = bodies.len(), "wrote calendar file");
        written.push(path);
    }

    Ok(written)
}

/// `"Seattle Poplar"` becomes `seattle_poplar.ics`.
pub fn file_name(location: &str) -> String {
    format!("{}.ics", location.to_lowercase().replace(' ', "_"))
}

/// Render a full VCALENDAR for `bodies`.
pub fn generate_calendar(name: &str, tz: Tz, bodies: &[EventBody]) -> GymCalResult<String> {
    let mut cal = Calendar::new();
    cal.name(name);
    cal.timezone(tz.name());

    for body in bodies {
        let mut event = icalendar::Event::new();
        event.uid(&uid(&body.key()));
        event.summary(&body.summary);
        event.location(&body.location);
        event.description(&body.description);
        event.add_property("DTSTART", utc_stamp(&body.start.with_timezone(&Utc)));
        event.add_property("DTEND", utc_stamp(&body.end.with_timezone(&Utc)));
        cal.push(event.done());
    }

    let output = cal.done().to_string();
    if !output.contains("BEGIN:VCALENDAR") {
        return Err(GymCalError::IcsGenerate(format!(
            "calendar output for '{}' is malformed",
            name
        )));
    }

    Ok(rewrite_prodid(&output))
}

/// Stable across runs so re-imports update rather than duplicate.
fn uid(key: &EventKey) -> String {
    let title: String = key
        .title()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!(
        "{}-{}-{}@gymcal",
        utc_stamp(&key.start()),
        utc_stamp(&key.end()),
        title
    )
}

fn utc_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn rewrite_prodid(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:GYMCAL\r\n");
            continue;
        }
        result.push_str(line);
        result.push_str("\r\n");
    }
    result
}
