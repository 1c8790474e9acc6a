//! Run configuration.
//!
//! Every field has a default that reproduces the Seattle Bouldering Project
//! setup, so a config file only needs to name what it overrides:
//!
//! ```toml
//! days = 3
//!
//! [calendar]
//! time_zone = "America/Los_Angeles"
//!
//! [[feeds]]
//! name = "classes"
//! prefix = "SBP –"
//! categories = ["Yoga", "Fitness"]
//! locations = ["Seattle Poplar"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{GymCalError, GymCalResult};
use crate::retry::RetryPolicy;

static DEFAULT_PORTAL_URL: &str = "https://boulderingproject.portal.approach.app/schedule/embed";
static DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
static DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
static DEFAULT_EMBED_BASE_URL: &str = "https://calendar.google.com/calendar/embed";

/// Top-level configuration, loaded from `~/.config/gymcal/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GymConfig {
    /// Number of days to scrape, starting today.
    pub days: u32,
    pub portal: PortalConfig,
    pub feeds: Vec<FeedConfig>,
    pub calendar: CalendarConfig,
    pub retry: RetryPolicy,
    /// Where `gymcal ics` writes per-location files.
    pub ics_output_dir: PathBuf,
}

impl Default for GymConfig {
    fn default() -> Self {
        GymConfig {
            days: 7,
            portal: PortalConfig::default(),
            feeds: vec![FeedConfig::default()],
            calendar: CalendarConfig::default(),
            retry: RetryPolicy::default(),
            ics_output_dir: PathBuf::from("ics_output"),
        }
    }
}

/// How to reach and read the schedule portal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// WebDriver server (chromedriver, geckodriver) that hosts the browser.
    pub webdriver_url: String,
    pub headless: bool,
    /// Timeout for page loads and for the schedule table to render.
    pub page_timeout_ms: u64,
    /// Rows of the rendered schedule table.
    pub row_selector: String,
    /// Marker the portal renders when a day has no classes.
    pub empty_selector: String,
    /// Element inside a row that opens its booking page.
    pub detail_click_selector: String,
    /// Default-location picker shown on first visit.
    pub location_prompt: Option<LocationPrompt>,
    pub locations: BTreeMap<String, u32>,
    pub categories: BTreeMap<String, u32>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        let locations = [
            ("Seattle Poplar", 1),
            ("Seattle Fremont", 2),
            ("Seattle Upper Walls", 3),
            ("Seattle University District", 4),
        ];
        let categories = [
            ("Events", 2),
            ("Climbing Classes", 4),
            ("Yoga", 5),
            ("Fitness", 6),
        ];

        PortalConfig {
            base_url: DEFAULT_PORTAL_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            page_timeout_ms: 10_000,
            row_selector: "table.MuiTable-root tbody tr.MuiTableRow-root".to_string(),
            empty_selector: "[data-testid='schedule-empty'], .schedule-empty".to_string(),
            detail_click_selector: "td:last-child button, td:last-child a".to_string(),
            location_prompt: Some(LocationPrompt::default()),
            locations: locations
                .into_iter()
                .map(|(name, id)| (name.to_string(), id))
                .collect(),
            categories: categories
                .into_iter()
                .map(|(name, id)| (name.to_string(), id))
                .collect(),
        }
    }
}

/// XPath locators for the location picker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationPrompt {
    pub option_xpath: String,
    pub confirm_xpath: String,
}

impl Default for LocationPrompt {
    fn default() -> Self {
        LocationPrompt {
            option_xpath: "//p[contains(normalize-space(.), 'Seattle Poplar')]".to_string(),
            confirm_xpath: "//button[contains(normalize-space(.), 'Save')]".to_string(),
        }
    }
}

/// One scrape-and-publish target: which classes go into which calendars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub name: String,
    /// Calendars are named `"<prefix> <location>"`.
    pub prefix: String,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
    /// Follow each bookable row to capture its registration URL.
    pub detail_urls: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            name: "classes".to_string(),
            prefix: "SBP –".to_string(),
            categories: ["Events", "Climbing Classes", "Yoga", "Fitness"]
                .map(String::from)
                .to_vec(),
            locations: [
                "Seattle Poplar",
                "Seattle University District",
                "Seattle Fremont",
            ]
            .map(String::from)
            .to_vec(),
            detail_urls: false,
        }
    }
}

/// Calendar service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Zone every scraped wall-clock time is interpreted in.
    pub time_zone: Tz,
    pub api_base_url: String,
    pub embed_base_url: String,
    /// Authorized-user token file (access + refresh token).
    pub token_path: PathBuf,
    /// OAuth client file used by `gymcal auth`.
    pub client_secret_path: PathBuf,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            time_zone: chrono_tz::America::Los_Angeles,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            embed_base_url: DEFAULT_EMBED_BASE_URL.to_string(),
            token_path: PathBuf::from("secrets/token.json"),
            client_secret_path: PathBuf::from("secrets/credential.json"),
        }
    }
}

impl GymConfig {
    pub fn config_path() -> GymCalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GymCalError::Config("Could not determine config directory".into()))?
            .join("gymcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> GymCalResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    return Ok(GymConfig::default());
                }
                default_path
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            GymCalError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml_str(&contents)
            .map_err(|e| GymCalError::Config(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> GymCalResult<Self> {
        let config: GymConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> GymCalResult<()> {
        if self.days == 0 {
            return Err(GymCalError::Config("days must be at least 1".into()));
        }

        if self.feeds.is_empty() {
            return Err(GymCalError::Config("at least one [[feeds]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.name.as_str()) {
                return Err(GymCalError::Config(format!(
                    "duplicate feed name '{}'",
                    feed.name
                )));
            }
        }

        self.retry.validate()
    }

    /// Feeds to process: the named one, or all of them.
    pub fn select_feeds(&self, name: Option<&str>) -> GymCalResult<Vec<&FeedConfig>> {
        match name {
            None => Ok(self.feeds.iter().collect()),
            Some(name) => match self.feeds.iter().find(|f| f.name == name) {
                Some(feed) => Ok(vec![feed]),
                None => {
                    let available: Vec<_> = self.feeds.iter().map(|f| f.name.as_str()).collect();
                    Err(GymCalError::Config(format!(
                        "Feed '{}' not found. Available: {}",
                        name,
                        available.join(", ")
                    )))
                }
            },
        }
    }
}
