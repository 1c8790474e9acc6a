//! Scraped schedule entries.
//!
//! Field names follow the JSON interchange format used for saved scrapes:
//!
//! ```json
//! {"2024-01-01": [{"eventName": "Yoga", "eventLocation": "Seattle Poplar",
//!                  "startTime": "09:00", "endTime": "10:00", "availableSpots": 5}]}
//! ```

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One row of the schedule table.
///
/// The date is not stored on the event; it is the [`EventsByDate`] key the
/// event is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEvent {
    #[serde(rename = "eventName")]
    pub name: String,
    #[serde(rename = "eventLocation")]
    pub location: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Missing when the portal shows only a start time.
    #[serde(with = "hhmm::option", default)]
    pub end_time: Option<NaiveTime>,
    /// `None` when the row has no "n/m left" text. Not the same as zero.
    #[serde(default)]
    pub available_spots: Option<u32>,
    /// Booking page, when the scrape followed the row.
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub detail_url: Option<String>,
}

/// Scraped events per calendar date, in date order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventsByDate(pub BTreeMap<NaiveDate, Vec<ClassEvent>>);

impl EventsByDate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, events: Vec<ClassEvent>) {
        self.0.insert(date, events);
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Total number of events across all dates.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    /// Every event paired with its date, in date then row order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &ClassEvent)> {
        self.0
            .iter()
            .flat_map(|(date, events)| events.iter().map(move |e| (*date, e)))
    }

    /// Events grouped by location, each group in date then row order.
    pub fn by_location(&self) -> BTreeMap<&str, Vec<(NaiveDate, &ClassEvent)>> {
        let mut groups: BTreeMap<&str, Vec<(NaiveDate, &ClassEvent)>> = BTreeMap::new();
        for (date, event) in self.iter() {
            groups
                .entry(event.location.as_str())
                .or_default()
                .push((date, event));
        }
        groups
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `HH:MM` (24-hour) encoding for wall-clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Accepts `HH:MM` and `HH:MM:SS`.
    fn parse(s: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map_err(|_| format!("invalid time '{}', expected HH:MM", s))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
