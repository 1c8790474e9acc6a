//! The calendar service the synchronizer publishes to.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::body::EventBody;
use crate::error::GymCalResult;
use crate::key::EventKey;

/// A calendar as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCalendar {
    pub id: String,
    pub summary: String,
}

/// A timed event as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl RemoteEvent {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.summary.clone(), &self.start, &self.end)
    }
}

/// One page of an event listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub items: Vec<RemoteEvent>,
    pub next_page_token: Option<String>,
}

/// Operations the synchronizer needs from a calendar provider.
///
/// Implementations map transport failures to
/// [`GymCalError::Remote`](crate::error::GymCalError::Remote) with the HTTP
/// status when there is one, so callers can tell transient failures apart.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// All calendars visible to the account.
    async fn list_calendars(&self) -> GymCalResult<Vec<RemoteCalendar>>;

    async fn create_calendar(&self, summary: &str, time_zone: Tz) -> GymCalResult<RemoteCalendar>;

    /// Timed events ending after `time_min`. All-day events are left out.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> GymCalResult<EventPage>;

    /// Returns the id the service assigned.
    async fn insert_event(&self, calendar_id: &str, event: &EventBody) -> GymCalResult<String>;

    /// Deleting an event that is already gone succeeds.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> GymCalResult<()>;

    /// Grant read access to everyone.
    async fn make_public(&self, calendar_id: &str) -> GymCalResult<()>;

    /// Public embed link for a calendar.
    fn public_url(&self, calendar_id: &str) -> String;
}
