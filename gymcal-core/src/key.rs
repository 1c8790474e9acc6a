use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Identity of a published event: title plus start and end instant.
///
/// Instants are stored in UTC, so `2024-01-01T09:00:00-08:00` and
/// `2024-01-01T17:00:00Z` produce the same key. Both the locally built
/// bodies and the events listed from the calendar service go through
/// [`EventKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl EventKey {
    pub fn new<A: TimeZone, B: TimeZone>(
        title: impl Into<String>,
        start: &DateTime<A>,
        end: &DateTime<B>,
    ) -> Self {
        EventKey {
            title: title.into(),
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} – {}]",
            self.title,
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use chrono_tz::America::Los_Angeles;
    use std::collections::HashSet;

    #[test]
    fn offsets_do_not_change_identity() {
        let local_start = Los_Angeles.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let local_end = Los_Angeles.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let from_body = EventKey::new("Yoga", &local_start, &local_end);

        let listed_start = DateTime::parse_from_rfc3339("2024-01-01T17:00:00Z").unwrap();
        let listed_end = DateTime::<FixedOffset>::parse_from_rfc3339("2024-01-01T10:00:00-08:00").unwrap();
        let from_remote = EventKey::new("Yoga", &listed_start, &listed_end);

        assert_eq!(from_body, from_remote);

        let set: HashSet<_> = [from_body, from_remote].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn title_is_part_of_identity() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap();

        assert_ne!(EventKey::new("Yoga", &start, &end), EventKey::new("Yoga ", &start, &end));
    }

    #[test]
    fn displays_iso_instants() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap();

        assert_eq!(
            EventKey::new("Yoga", &start, &end).to_string(),
            "Yoga [2024-01-01T17:00:00Z – 2024-01-01T18:00:00Z]"
        );
    }
}
