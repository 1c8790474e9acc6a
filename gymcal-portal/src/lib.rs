//! Schedule extraction for gymcal.
//!
//! An [`Extractor`] drives a [`PortalSession`] through the portal's week view
//! one date at a time and turns each rendered table row into a
//! [`ClassEvent`](gymcal_core::ClassEvent).

pub mod error;
pub mod extractor;
pub mod parse;
pub mod rows;
pub mod schedule;
pub mod session;

pub use error::{PortalError, PortalResult};
pub use extractor::{Extractor, Scrape};
pub use session::{PortalSession, WebDriverSession};
