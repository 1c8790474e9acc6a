use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use gymcal_core::{GymConfig, Synchronizer};
use gymcal_provider_google::{GoogleCalendar, Session};
use owo_colors::OwoColorize;

use super::gather;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(
    config: &GymConfig,
    feed: Option<&str>,
    days: Option<u32>,
    input: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    // Fail on a bad token before spending time in the browser.
    let mut session = Session::load_valid(&config.calendar.token_path).await?;

    let scrapes = gather(config, feed, days, input).await?;

    // The scrape can outlast the token.
    session.ensure_fresh().await?;
    session.report_to_ci()?;

    let service = GoogleCalendar::new(&config.calendar, session.access_token());
    let synchronizer =
        Synchronizer::new(&service, config.calendar.time_zone, config.retry.clone()).dry_run(dry_run);

    let mut failures = 0;
    let (mut inserted, mut deleted) = (0, 0);

    for (i, (feed, scrape)) in scrapes.iter().enumerate() {
        println!("{}", scrape.render());

        let spinner = create_spinner(format!("Syncing {}", feed.name));
        let report = synchronizer
            .sync(&scrape.events, &feed.prefix, Utc::now(), &scrape.incomplete_dates)
            .await;
        spinner.finish_and_clear();

        println!("{}", report.render());

        failures += report.failures();
        let (ins, del) = report.totals();
        inserted += ins;
        deleted += del;

        // Add spacing between feeds (but not after the last one)
        if i < scrapes.len() - 1 {
            println!();
        }
    }

    let verb = if dry_run { "Would add" } else { "Added" };
    println!("\n{} {}, removed {}", verb, inserted, deleted);

    if failures > 0 {
        anyhow::bail!("{} {} failed to sync", failures, if failures == 1 { "location" } else { "locations" });
    }

    if !dry_run {
        println!("{}", "Sync complete".green());
    }

    Ok(())
}
