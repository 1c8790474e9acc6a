use std::path::Path;

use anyhow::{Context, Result};
use gymcal_core::ics::write_location_calendars;
use gymcal_core::GymConfig;
use owo_colors::OwoColorize;

use super::gather;
use crate::render::Render;

pub async fn run(
    config: &GymConfig,
    feed: Option<&str>,
    days: Option<u32>,
    input: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let scrapes = gather(config, feed, days, input).await?;
    // Feeds share location names, so each gets its own directory when there are several.
    let per_feed_dirs = scrapes.len() > 1;

    for (feed, scrape) in &scrapes {
        println!("{}", scrape.render());

        let dir = if per_feed_dirs {
            out_dir.join(&feed.name)
        } else {
            out_dir.to_path_buf()
        };

        let written = write_location_calendars(&scrape.events, &feed.prefix, config.calendar.time_zone, &dir)
            .with_context(|| format!("Failed to export feed '{}'", feed.name))?;

        for path in written {
            println!("   {} {}", "✓".green(), path.display());
        }
    }

    Ok(())
}
