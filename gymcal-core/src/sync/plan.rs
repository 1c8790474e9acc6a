//! Set difference between what is published and what was scraped.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::body::EventBody;
use crate::key::EventKey;
use crate::remote::RemoteEvent;

/// Changes that bring a calendar in line with the scraped schedule.
///
/// Events whose key is on both sides are left alone, even when their
/// description differs.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub to_delete: Vec<RemoteEvent>,
    pub to_add: Vec<EventBody>,
    pub unchanged: usize,
}

impl SyncPlan {
    /// Compare `existing` remote events against `desired` bodies by [`EventKey`].
    ///
    /// Duplicate keys in `desired` collapse to the first occurrence. When
    /// the calendar already holds several copies of a wanted key, the first
    /// listed one is kept and the rest are deleted.
    pub fn compute(existing: Vec<RemoteEvent>, desired: Vec<EventBody>) -> Self {
        let mut desired_keys: HashSet<EventKey> = HashSet::new();
        let mut candidates = Vec::new();

        for body in desired {
            let key = body.key();
            if desired_keys.insert(key.clone()) {
                candidates.push((key, body));
            } else {
                warn!(event = %key, "duplicate event in scraped schedule, keeping the first");
            }
        }

        let mut kept: HashSet<EventKey> = HashSet::new();
        let mut to_delete = Vec::new();
        let mut unchanged = 0;

        for event in existing {
            let key = event.key();
            if !desired_keys.contains(&key) {
                to_delete.push(event);
            } else if kept.insert(key.clone()) {
                unchanged += 1;
            } else {
                debug!(event = %key, id = %event.id, "surplus copy of published event");
                to_delete.push(event);
            }
        }

        let mut to_add: Vec<EventBody> = candidates
            .into_iter()
            .filter(|(key, _)| !kept.contains(key))
            .map(|(_, body)| body)
            .collect();

        to_delete.sort_by(|a, b| (a.start, &a.summary).cmp(&(b.start, &b.summary)));
        to_add.sort_by(|a, b| (a.start, &a.summary).cmp(&(b.start, &b.summary)));

        SyncPlan {
            to_delete,
            to_add,
            unchanged,
        }
    }

    /// Drop planned deletions of events `protect` selects. Returns how many
    /// were spared.
    pub fn spare(&mut self, protect: impl Fn(&RemoteEvent) -> bool) -> usize {
        let before = self.to_delete.len();
        self.to_delete.retain(|event| !protect(event));
        before - self.to_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use chrono_tz::America::Los_Angeles;

    fn body(title: &str, hour: u32) -> EventBody {
        let start = Los_Angeles.with_ymd_and_hms(2030, 5, 1, hour, 0, 0).unwrap();
        EventBody {
            summary: title.to_string(),
            location: "Seattle Poplar".to_string(),
            description: "Available Spots: 1".to_string(),
            start,
            end: start + Duration::hours(1),
        }
    }

    fn remote(id: &str, title: &str, hour: u32) -> RemoteEvent {
        let b = body(title, hour);
        RemoteEvent {
            id: id.to_string(),
            summary: b.summary,
            start: b.start.fixed_offset(),
            end: b.end.fixed_offset(),
        }
    }

    fn titles_added(plan: &SyncPlan) -> Vec<&str> {
        plan.to_add.iter().map(|b| b.summary.as_str()).collect()
    }

    fn ids_deleted(plan: &SyncPlan) -> Vec<&str> {
        plan.to_delete.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn deletes_missing_and_adds_new() {
        let existing = vec![remote("a", "A", 8), remote("b", "B", 9), remote("c", "C", 10)];
        let desired = vec![body("B", 9), body("C", 10), body("D", 11)];

        let plan = SyncPlan::compute(existing, desired);

        assert_eq!(ids_deleted(&plan), vec!["a"]);
        assert_eq!(titles_added(&plan), vec!["D"]);
        assert_eq!(plan.unchanged, 2);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let existing = vec![remote("c", "C", 10), remote("a", "A", 8), remote("b", "B", 9)];
        let desired = vec![body("D", 11), body("C", 10), body("B", 9)];

        let plan = SyncPlan::compute(existing, desired);

        assert_eq!(ids_deleted(&plan), vec!["a"]);
        assert_eq!(titles_added(&plan), vec!["D"]);
    }

    #[test]
    fn identical_sets_produce_empty_plan() {
        let existing = vec![remote("a", "A", 8), remote("b", "B", 9)];
        let desired = vec![body("A", 8), body("B", 9)];

        let plan = SyncPlan::compute(existing, desired);

        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 2);
    }

    #[test]
    fn description_changes_are_not_updates() {
        let mut changed = body("A", 8);
        changed.description = "Available Spots: 0".to_string();

        let plan = SyncPlan::compute(vec![remote("a", "A", 8)], vec![changed]);

        assert!(plan.is_empty());
    }

    #[test]
    fn same_title_at_different_time_is_a_different_event() {
        let plan = SyncPlan::compute(vec![remote("a", "A", 8)], vec![body("A", 9)]);

        assert_eq!(ids_deleted(&plan), vec!["a"]);
        assert_eq!(titles_added(&plan), vec!["A"]);
    }

    #[test]
    fn duplicate_scraped_rows_are_added_once() {
        let plan = SyncPlan::compute(vec![], vec![body("A", 8), body("A", 8)]);

        assert_eq!(titles_added(&plan), vec!["A"]);
    }

    #[test]
    fn surplus_published_copies_are_deleted() {
        let existing = vec![remote("a1", "A", 8), remote("a2", "A", 8)];

        let plan = SyncPlan::compute(existing, vec![body("A", 8)]);

        assert_eq!(ids_deleted(&plan), vec!["a2"]);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn spared_events_still_match_desired() {
        let existing = vec![remote("a", "A", 8), remote("b", "B", 9)];

        let mut plan = SyncPlan::compute(existing, vec![body("A", 8)]);
        let spared = plan.spare(|e| e.id == "b");

        assert_eq!(spared, 1);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn remote_offsets_match_local_bodies() {
        let mut listed = remote("a", "A", 8);
        let utc_start: DateTime<chrono::Utc> = listed.start.into();
        let utc_end: DateTime<chrono::Utc> = listed.end.into();
        listed.start = utc_start.fixed_offset();
        listed.end = utc_end.fixed_offset();

        let plan = SyncPlan::compute(vec![listed], vec![body("A", 8)]);

        assert!(plan.is_empty());
    }
}
