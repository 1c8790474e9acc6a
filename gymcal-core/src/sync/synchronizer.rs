use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::body::EventBody;
use crate::error::GymCalResult;
use crate::event::{ClassEvent, EventsByDate};
use crate::remote::{CalendarService, RemoteCalendar, RemoteEvent};
use crate::retry::{retry_remote, RetryPolicy};
use crate::sync::SyncPlan;

/// Display name of a location's calendar, e.g. `"SBP – Seattle Poplar"`.
pub fn calendar_name(prefix: &str, location: &str) -> String {
    format!("{} {}", prefix, location)
}

/// Outcome for one location's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationReport {
    pub location: String,
    pub calendar_name: String,
    /// `None` only in a dry run against a calendar that does not exist yet.
    pub calendar_id: Option<String>,
    pub public_url: Option<String>,
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Scraped events that had already started and were not published.
    pub skipped_past: usize,
    pub made_public: bool,
    pub dry_run: bool,
}

/// Per-location results of a sync run, in location order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub locations: Vec<(String, GymCalResult<LocationReport>)>,
}

impl SyncReport {
    pub fn failures(&self) -> usize {
        self.locations.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn totals(&self) -> (usize, usize) {
        self.locations
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .fold((0, 0), |(ins, del), r| (ins + r.inserted, del + r.deleted))
    }
}

/// Reconciles scraped schedules with per-location calendars.
pub struct Synchronizer<'a, S: CalendarService + ?Sized> {
    service: &'a S,
    time_zone: Tz,
    retry: RetryPolicy,
    dry_run: bool,
}

impl<'a, S: CalendarService + ?Sized> Synchronizer<'a, S> {
    pub fn new(service: &'a S, time_zone: Tz, retry: RetryPolicy) -> Self {
        Synchronizer {
            service,
            time_zone,
            retry,
            dry_run: false,
        }
    }

    /// Compute and report plans without changing anything remotely.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sync every location in `schedule`.
    ///
    /// Published events on `protected` dates are never deleted; use it for
    /// dates the scrape could not read completely. A failing location does
    /// not stop the others.
    pub async fn sync(
        &self,
        schedule: &EventsByDate,
        prefix: &str,
        now: DateTime<Utc>,
        protected: &BTreeSet<NaiveDate>,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        for (location, events) in schedule.by_location() {
            let result = self
                .sync_location(prefix, location, &events, now, protected)
                .await;

            if let Err(ref e) = result {
                warn!(location, error = %e, "location sync failed");
            }
            report.locations.push((location.to_string(), result));
        }

        report
    }

    pub async fn sync_location(
        &self,
        prefix: &str,
        location: &str,
        events: &[(NaiveDate, &ClassEvent)],
        now: DateTime<Utc>,
        protected: &BTreeSet<NaiveDate>,
    ) -> GymCalResult<LocationReport> {
        // Validate everything before touching the calendar.
        let bodies = events
            .iter()
            .map(|(date, event)| EventBody::from_class(*date, event, self.time_zone))
            .collect::<GymCalResult<Vec<_>>>()?;

        let total = bodies.len();
        let desired: Vec<EventBody> = bodies.into_iter().filter(|b| b.start >= now).collect();
        let skipped_past = total - desired.len();
        if skipped_past > 0 {
            debug!(location, skipped_past, "skipping events that already started");
        }

        let calendar_name = calendar_name(prefix, location);
        let calendar = self.resolve_calendar(&calendar_name).await?;

        let existing = match calendar {
            Some(ref cal) => self.fetch_existing(&cal.id, now).await?,
            None => Vec::new(),
        };

        // Events on protected dates still match scraped rows, they just never get deleted.
        let mut plan = SyncPlan::compute(existing, desired);
        let spared = plan.spare(|event| {
            protected.contains(&event.start.with_timezone(&self.time_zone).date_naive())
        });
        if spared > 0 {
            debug!(location, spared, "keeping published events on incomplete dates");
        }
        let calendar_id = calendar.as_ref().map(|c| c.id.clone());

        let mut report = LocationReport {
            location: location.to_string(),
            calendar_name: calendar_name.clone(),
            public_url: calendar_id.as_deref().map(|id| self.service.public_url(id)),
            calendar_id,
            inserted: plan.to_add.len(),
            deleted: plan.to_delete.len(),
            unchanged: plan.unchanged,
            skipped_past,
            made_public: false,
            dry_run: self.dry_run,
        };

        if self.dry_run {
            info!(
                location,
                calendar = %calendar_name,
                to_add = report.inserted,
                to_delete = report.deleted,
                "dry run, no changes applied"
            );
            return Ok(report);
        }

        // Dry runs returned above, so the calendar was resolved or created.
        let Some(calendar) = calendar else {
            return Ok(report);
        };

        self.apply(&calendar, &plan).await?;
        report.made_public = self.ensure_public(&calendar).await;

        info!(
            location,
            calendar_id = %calendar.id,
            inserted = report.inserted,
            deleted = report.deleted,
            unchanged = report.unchanged,
            "calendar synced"
        );

        Ok(report)
    }

    /// Find the calendar by display name, creating it unless this is a dry run.
    ///
    /// Display names are not unique. When several calendars share the name,
    /// the first one listed is used.
    async fn resolve_calendar(&self, name: &str) -> GymCalResult<Option<RemoteCalendar>> {
        let calendars = retry_remote(&self.retry, "list calendars", || {
            self.service.list_calendars()
        })
        .await?;

        let mut matching = calendars.into_iter().filter(|c| c.summary == name);
        if let Some(found) = matching.next() {
            let others = matching.count();
            if others > 0 {
                warn!(calendar = name, id = %found.id, others, "several calendars share this name, using the first");
            }
            return Ok(Some(found));
        }

        if self.dry_run {
            return Ok(None);
        }

        let created = retry_remote(&self.retry, "create calendar", || {
            self.service.create_calendar(name, self.time_zone)
        })
        .await?;
        info!(calendar = name, id = %created.id, "created calendar");

        Ok(Some(created))
    }

    /// Published events that have not started yet.
    async fn fetch_existing(&self, calendar_id: &str, now: DateTime<Utc>) -> GymCalResult<Vec<RemoteEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = retry_remote(&self.retry, "list events", || {
                self.service
                    .list_events(calendar_id, now, page_token.as_deref())
            })
            .await?;

            // The service bounds on end time; events in progress still show up.
            events.extend(page.items.into_iter().filter(|event| event.start >= now));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(events)
    }

    async fn apply(&self, calendar: &RemoteCalendar, plan: &SyncPlan) -> GymCalResult<()> {
        for event in &plan.to_delete {
            retry_remote(&self.retry, "delete event", || {
                self.service.delete_event(&calendar.id, &event.id)
            })
            .await?;
            debug!(event = %event.key(), "deleted");
        }

        for body in &plan.to_add {
            let id = retry_remote(&self.retry, "insert event", || {
                self.service.insert_event(&calendar.id, body)
            })
            .await?;
            debug!(event = %body.key(), id = %id, "inserted");
        }

        Ok(())
    }

    async fn ensure_public(&self, calendar: &RemoteCalendar) -> bool {
        match retry_remote(&self.retry, "make calendar public", || {
            self.service.make_public(&calendar.id)
        })
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(calendar_id = %calendar.id, error = %e, "couldn't make calendar public");
                false
            }
        }
    }
}
