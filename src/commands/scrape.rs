use std::path::Path;

use anyhow::{Context, Result};
use gymcal_core::GymConfig;

use super::{resolve_feeds, scrape_feeds, window_days};
use crate::render::Render;

pub async fn run(config: &GymConfig, feed: Option<&str>, days: Option<u32>, output: Option<&Path>) -> Result<()> {
    let feeds = resolve_feeds(config, feed, true)?;
    let days = window_days(config, days)?;

    let scrapes = scrape_feeds(config, feeds, days).await?;

    for (_, scrape) in scrapes {
        let json = scrape.events.to_json_pretty()?;
        match output {
            Some(path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("{}", scrape.render());
                eprintln!("Saved to {}", path.display());
            }
            None => {
                println!("{}", json);
                eprintln!("{}", scrape.render());
            }
        }
    }

    Ok(())
}
