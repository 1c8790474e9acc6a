//! Colored terminal output for gymcal results.

use gymcal_core::{GymCalResult, LocationReport, SyncReport};
use gymcal_portal::Scrape;
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

impl Render for LocationReport {
    /// One line: name, counts, then the public link.
    fn render(&self) -> String {
        let mut parts = vec![
            format!("📅 {}", self.calendar_name),
            format!("+{} added", self.inserted).green().to_string(),
            format!("-{} removed", self.deleted).red().to_string(),
            format!("({} unchanged)", self.unchanged).dimmed().to_string(),
        ];

        if self.skipped_past > 0 {
            let noun = if self.skipped_past == 1 { "class" } else { "classes" };
            parts.push(
                format!("{} {} already started", self.skipped_past, noun)
                    .dimmed()
                    .to_string(),
            );
        }
        if self.made_public {
            parts.push("now public".cyan().to_string());
        }
        match &self.public_url {
            Some(url) => parts.push(url.dimmed().to_string()),
            None => parts.push("(calendar not created yet)".dimmed().to_string()),
        }
        if self.dry_run {
            parts.push("(dry run)".yellow().to_string());
        }

        parts.join("  ")
    }
}

fn render_location(location: &str, result: &GymCalResult<LocationReport>) -> String {
    match result {
        Ok(report) => report.render(),
        Err(e) => format!("📅 {}  {}", location, e.to_string().red()),
    }
}

impl Render for SyncReport {
    fn render(&self) -> String {
        if self.locations.is_empty() {
            return "No events to publish".dimmed().to_string();
        }

        self.locations
            .iter()
            .map(|(location, result)| render_location(location, result))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Render for Scrape {
    fn render(&self) -> String {
        let events = self.events.len();
        let dates = self.events.dates().count();
        let mut line = format!(
            "Scraped {} {} over {} {}",
            events,
            pluralize("event", events),
            dates,
            pluralize("day", dates)
        );

        if !self.incomplete_dates.is_empty() {
            let incomplete: Vec<String> = self.incomplete_dates.iter().map(|d| d.to_string()).collect();
            line = format!(
                "{}\n{}",
                line,
                format!("   incomplete: {}", incomplete.join(", ")).yellow()
            );
        }

        line
    }
}
