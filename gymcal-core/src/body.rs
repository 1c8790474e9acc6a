//! Calendar entries synthesized from scraped rows.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{GymCalError, GymCalResult};
use crate::event::ClassEvent;
use crate::key::EventKey;

/// What gets published for one scraped class.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBody {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl EventBody {
    /// Build the body for `event` on `date`, interpreting its wall-clock
    /// times in `tz`.
    ///
    /// An end time at or before the start time is taken to be on the next
    /// day. A missing end time, or a local time that does not exist in `tz`,
    /// is rejected.
    pub fn from_class(date: NaiveDate, event: &ClassEvent, tz: Tz) -> GymCalResult<Self> {
        let invalid = |reason: &str| GymCalError::Validation {
            event: event.name.clone(),
            date: date.to_string(),
            reason: reason.to_string(),
        };

        let end_time = event
            .end_time
            .ok_or_else(|| invalid("missing end time"))?;

        let start = localize(tz, date, event.start_time)
            .ok_or_else(|| invalid("start time does not exist in the configured time zone"))?;

        let end_date = if end_time <= event.start_time {
            date.succ_opt().ok_or_else(|| invalid("end date out of range"))?
        } else {
            date
        };
        let end = localize(tz, end_date, end_time)
            .ok_or_else(|| invalid("end time does not exist in the configured time zone"))?;

        Ok(EventBody {
            summary: event.name.clone(),
            location: event.location.clone(),
            description: describe(event),
            start,
            end,
        })
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(self.summary.clone(), &self.start, &self.end)
    }

    /// IANA name of the zone the times are expressed in.
    pub fn time_zone(&self) -> &'static str {
        self.start.timezone().name()
    }
}

/// Description text: availability, plus the booking link when known.
pub fn describe(event: &ClassEvent) -> String {
    let spots = match event.available_spots {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    };

    let mut description = format!("Available Spots: {}", spots);
    if let Some(ref url) = event.detail_url {
        description.push_str(&format!("\nRegister here: {}", url));
    }
    description
}

/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}
