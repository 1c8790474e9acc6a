//! Reconciliation of scraped schedules with published calendars.

mod plan;
mod synchronizer;

pub use plan::SyncPlan;
pub use synchronizer::{calendar_name, LocationReport, SyncReport, Synchronizer};
