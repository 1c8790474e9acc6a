//! Google Calendar backend for gymcal.
//!
//! [`GoogleCalendar`] implements [`gymcal_core::CalendarService`] over the v3
//! REST API. [`Session`] turns the token file into a live access token and
//! [`auth::authenticate`] produces that file in the first place.

pub mod api;
pub mod auth;
pub mod session;
pub mod types;

pub use api::GoogleCalendar;
pub use auth::InstalledClient;
pub use session::{AuthorizedUser, Session};
