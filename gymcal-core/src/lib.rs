//! Core types for gymcal.
//!
//! This crate is shared by the CLI, the portal scraper and the calendar
//! provider:
//! - `event` for the scraped schedule and its JSON interchange format
//! - `body` and `key` for the calendar entries built from it
//! - `remote` for the calendar-service seam
//! - `sync` for the set-difference synchronizer
//! - `ics` for file export

pub mod body;
pub mod config;
pub mod error;
pub mod event;
pub mod ics;
pub mod key;
pub mod remote;
pub mod retry;
pub mod sync;

pub use body::EventBody;
pub use config::{CalendarConfig, FeedConfig, GymConfig, PortalConfig};
pub use error::{GymCalError, GymCalResult};
pub use event::{ClassEvent, EventsByDate};
pub use key::EventKey;
pub use remote::{CalendarService, EventPage, RemoteCalendar, RemoteEvent};
pub use retry::RetryPolicy;
pub use sync::{LocationReport, SyncPlan, SyncReport, Synchronizer};
