pub mod auth;
pub mod ics;
pub mod scrape;
pub mod sync;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use gymcal_core::{EventsByDate, FeedConfig, GymConfig};
use gymcal_portal::{Extractor, Scrape, WebDriverSession};
use tracing::warn;

use crate::utils::tui::create_spinner;

/// First date of the scrape window: today, in the calendar's zone.
fn today(config: &GymConfig) -> NaiveDate {
    Utc::now()
        .with_timezone(&config.calendar.time_zone)
        .date_naive()
}

fn window_days(config: &GymConfig, days: Option<u32>) -> Result<u32> {
    match days.unwrap_or(config.days) {
        0 => anyhow::bail!("--days must be at least 1"),
        n => Ok(n),
    }
}

/// Feeds a command works on.
///
/// A saved scrape (and `gymcal scrape` output) holds a single feed, so those
/// need the choice to be unambiguous.
fn resolve_feeds<'a>(config: &'a GymConfig, feed: Option<&str>, single: bool) -> Result<Vec<&'a FeedConfig>> {
    let feeds = config.select_feeds(feed)?;

    if single && feeds.len() > 1 {
        let names: Vec<_> = feeds.iter().map(|f| f.name.as_str()).collect();
        anyhow::bail!(
            "Multiple feeds configured ({}). Pick one with --feed.",
            names.join(", ")
        );
    }

    Ok(feeds)
}

/// Read a `gymcal scrape` file. Nothing in it is known to be incomplete.
fn load_input(path: &Path) -> Result<Scrape> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let events = EventsByDate::from_json(&contents)
        .with_context(|| format!("Failed to parse schedule from {}", path.display()))?;

    Ok(Scrape {
        events,
        incomplete_dates: BTreeSet::new(),
    })
}

/// Scrape each feed in one browser session.
async fn scrape_feeds<'a>(
    config: &GymConfig,
    feeds: Vec<&'a FeedConfig>,
    days: u32,
) -> Result<Vec<(&'a FeedConfig, Scrape)>> {
    let session = WebDriverSession::connect(&config.portal)
        .await
        .context("Couldn't start a browser session. Is the WebDriver server running?")?;
    let mut extractor = Extractor::new(session, config.portal.clone(), config.retry.clone());

    if let Err(e) = extractor.prepare().await {
        if let Err(close_err) = extractor.close().await {
            warn!(error = %close_err, "couldn't close browser session");
        }
        return Err(anyhow::Error::new(e).context("Couldn't open the schedule portal"));
    }

    let start = today(config);
    let mut scrapes = Vec::with_capacity(feeds.len());
    for feed in feeds {
        let spinner = create_spinner(format!("Scraping {}", feed.name));
        let scrape = extractor.scrape_feed(feed, start, days).await;
        spinner.finish_and_clear();
        scrapes.push((feed, scrape));
    }

    if let Err(e) = extractor.close().await {
        warn!(error = %e, "couldn't close browser session");
    }

    Ok(scrapes)
}

/// The schedule to work on: a saved scrape, or a fresh one.
async fn gather<'a>(
    config: &'a GymConfig,
    feed: Option<&str>,
    days: Option<u32>,
    input: Option<&Path>,
) -> Result<Vec<(&'a FeedConfig, Scrape)>> {
    match input {
        Some(path) => {
            let feeds = resolve_feeds(config, feed, true)?;
            let scrape = load_input(path)?;
            Ok(feeds.into_iter().map(|f| (f, scrape.clone())).collect())
        }
        None => {
            let feeds = resolve_feeds(config, feed, false)?;
            scrape_feeds(config, feeds, window_days(config, days)?).await
        }
    }
}
