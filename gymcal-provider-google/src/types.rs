//! Calendar v3 wire types.
//!
//! Only the fields gymcal reads or writes are modelled.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use gymcal_core::{EventBody, RemoteCalendar, RemoteEvent};
use serde::{Deserialize, Serialize};

// =============================================================================
// Calendars
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarList {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
}

impl From<CalendarListEntry> for RemoteCalendar {
    fn from(entry: CalendarListEntry) -> Self {
        RemoteCalendar {
            id: entry.id,
            summary: entry.summary,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendar<'a> {
    pub summary: &'a str,
    pub time_zone: &'a str,
}

/// Access-control rule; `default` scope with `reader` role makes a calendar public.
#[derive(Debug, Serialize)]
pub struct AclRule {
    pub role: &'static str,
    pub scope: AclScope,
}

#[derive(Debug, Serialize)]
pub struct AclScope {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl AclRule {
    pub fn public_reader() -> Self {
        AclRule {
            role: "reader",
            scope: AclScope { kind: "default" },
        }
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub start: Option<GoogleTime>,
    pub end: Option<GoogleTime>,
}

/// Either `dateTime` (timed) or `date` (all-day) is set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTime {
    pub date_time: Option<DateTime<FixedOffset>>,
    pub date: Option<String>,
}

impl GoogleEvent {
    /// `None` for all-day events and events without both times.
    pub fn into_remote(self) -> Option<RemoteEvent> {
        let start = self.start?.date_time?;
        let end = self.end?.date_time?;
        Some(RemoteEvent {
            id: self.id,
            summary: self.summary,
            start,
            end,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Created {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: NewEventTime,
    pub end: NewEventTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEventTime {
    pub date_time: String,
    pub time_zone: String,
}

impl From<&EventBody> for NewEvent {
    fn from(body: &EventBody) -> Self {
        let zone = body.time_zone().to_string();
        NewEvent {
            summary: body.summary.clone(),
            location: body.location.clone(),
            description: body.description.clone(),
            start: NewEventTime {
                date_time: body.start.to_rfc3339_opts(SecondsFormat::Secs, false),
                time_zone: zone.clone(),
            },
            end: NewEventTime {
                date_time: body.end.to_rfc3339_opts(SecondsFormat::Secs, false),
                time_zone: zone,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use chrono_tz::America::Los_Angeles;
    use gymcal_core::ClassEvent;

    #[test]
    fn all_day_events_are_skipped() {
        let list: EventList = serde_json::from_str(
            r#"{"items": [
                {"id": "a", "summary": "Yoga",
                 "start": {"dateTime": "2024-01-01T09:00:00-08:00", "timeZone": "America/Los_Angeles"},
                 "end": {"dateTime": "2024-01-01T10:00:00-08:00"}},
                {"id": "b", "summary": "Closed", "start": {"date": "2024-01-02"}, "end": {"date": "2024-01-03"}},
                {"id": "c", "summary": "Broken"}
            ]}"#,
        )
        .unwrap();

        let remote: Vec<RemoteEvent> = list.items.into_iter().filter_map(GoogleEvent::into_remote).collect();

        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].id, "a");
        assert_eq!(remote[0].start.to_rfc3339(), "2024-01-01T09:00:00-08:00");
    }

    #[test]
    fn event_body_serializes_with_zone() {
        let class = ClassEvent {
            name: "Yoga".to_string(),
            location: "Seattle Poplar".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            available_spots: Some(5),
            detail_url: None,
        };
        let body = EventBody::from_class(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &class, Los_Angeles).unwrap();

        let json = serde_json::to_value(NewEvent::from(&body)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "summary": "Yoga",
                "location": "Seattle Poplar",
                "description": "Available Spots: 5",
                "start": {"dateTime": "2024-01-01T09:00:00-08:00", "timeZone": "America/Los_Angeles"},
                "end": {"dateTime": "2024-01-01T10:00:00-08:00", "timeZone": "America/Los_Angeles"}
            })
        );
    }

    #[test]
    fn acl_rule_shape() {
        assert_eq!(
            serde_json::to_value(AclRule::public_reader()).unwrap(),
            serde_json::json!({"role": "reader", "scope": {"type": "default"}})
        );
    }
}
