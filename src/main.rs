mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gymcal_core::GymConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "gymcal=info,gymcal_core=info,gymcal_portal=info,gymcal_provider_google=info";

#[derive(Parser)]
#[command(name = "gymcal")]
#[command(about = "Scrape a climbing gym's class schedule and publish it to per-location calendars")]
struct Cli {
    /// Config file (defaults to ~/.config/gymcal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the schedule and print it as JSON
    Scrape {
        /// Only scrape this feed (by name)
        #[arg(short, long)]
        feed: Option<String>,

        /// Number of days to scrape, starting today
        #[arg(long)]
        days: Option<u32>,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Publish the schedule to one public calendar per location
    Sync {
        /// Only sync this feed (by name)
        #[arg(short, long)]
        feed: Option<String>,

        /// Number of days to scrape, starting today
        #[arg(long)]
        days: Option<u32>,

        /// Use a saved `gymcal scrape` JSON file instead of scraping
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Show what would change without touching any calendar
        #[arg(long)]
        dry_run: bool,
    },
    /// Write one .ics file per location
    Ics {
        /// Only export this feed (by name)
        #[arg(short, long)]
        feed: Option<String>,

        /// Number of days to scrape, starting today
        #[arg(long)]
        days: Option<u32>,

        /// Use a saved `gymcal scrape` JSON file instead of scraping
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory (defaults to `ics_output_dir` from the config)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Authorize gymcal against Google Calendar and write the token file
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = GymConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape { feed, days, output } => {
            commands::scrape::run(&config, feed.as_deref(), days, output.as_deref()).await
        }
        Commands::Sync {
            feed,
            days,
            input,
            dry_run,
        } => commands::sync::run(&config, feed.as_deref(), days, input.as_deref(), dry_run).await,
        Commands::Ics {
            feed,
            days,
            input,
            out_dir,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| config.ics_output_dir.clone());
            commands::ics::run(&config, feed.as_deref(), days, input.as_deref(), &out_dir).await
        }
        Commands::Auth => commands::auth::run(&config).await,
    }
}
