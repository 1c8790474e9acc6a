use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use gymcal_core::{ClassEvent, EventsByDate, FeedConfig, PortalConfig, RetryPolicy};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{PortalError, PortalResult};
use crate::parse::parse_row;
use crate::rows::extract_rows;
use crate::schedule::schedule_url;
use crate::session::PortalSession;

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What one feed's scrape produced.
#[derive(Debug, Clone, Default)]
pub struct Scrape {
    pub events: EventsByDate,
    /// Dates that failed to load or had rows that could not be read.
    pub incomplete_dates: BTreeSet<NaiveDate>,
}

struct DatePage {
    events: Vec<ClassEvent>,
    rejected: usize,
}

/// Reads the class schedule through a [`PortalSession`].
pub struct Extractor<S: PortalSession> {
    session: S,
    portal: PortalConfig,
    retry: RetryPolicy,
}

impl<S: PortalSession> Extractor<S> {
    pub fn new(session: S, portal: PortalConfig, retry: RetryPolicy) -> Self {
        Extractor {
            session,
            portal,
            retry,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.portal.page_timeout_ms)
    }

    /// Open the portal and get past the default-location picker, if shown.
    pub async fn prepare(&mut self) -> PortalResult<()> {
        let base_url = self.portal.base_url.clone();
        self.load_page(&base_url, None).await?;

        let Some(prompt) = self.portal.location_prompt.clone() else {
            return Ok(());
        };
        match self.session.click_xpath(&prompt.option_xpath).await {
            Ok(()) => {
                if let Err(e) = self.session.click_xpath(&prompt.confirm_xpath).await {
                    warn!(error = %e, "couldn't confirm default location");
                } else {
                    debug!("default location saved");
                }
            }
            Err(e) => debug!(error = %e, "no location picker shown"),
        }

        Ok(())
    }

    /// Scrape `days` consecutive dates starting at `start` for one feed.
    ///
    /// A date that cannot be loaded is recorded as incomplete and the scan
    /// moves on. Rows that parse are kept even when siblings do not.
    pub async fn scrape_feed(&mut self, feed: &FeedConfig, start: NaiveDate, days: u32) -> Scrape {
        let mut scrape = Scrape::default();

        for offset in 0..days {
            let Some(date) = start.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };

            match self.scrape_date(feed, date).await {
                Ok(page) => {
                    if page.rejected > 0 {
                        warn!(feed = %feed.name, %date, rejected = page.rejected, "some rows were unreadable");
                        scrape.incomplete_dates.insert(date);
                    }
                    info!(feed = %feed.name, %date, events = page.events.len(), "scraped date");
                    scrape.events.insert(date, page.events);
                }
                Err(e) => {
                    error!(feed = %feed.name, %date, error = %e, "couldn't scrape date");
                    scrape.incomplete_dates.insert(date);
                }
            }
        }

        scrape
    }

    async fn scrape_date(&mut self, feed: &FeedConfig, date: NaiveDate) -> PortalResult<DatePage> {
        let url = schedule_url(&self.portal, date, &feed.categories, &feed.locations)?;
        let html = self.load_schedule(&url).await?;
        let rows = extract_rows(&html, &self.portal.row_selector)?;

        let mut events = Vec::with_capacity(rows.len());
        let mut row_indexes = Vec::with_capacity(rows.len());
        let mut rejected = 0;
        for row in rows {
            match parse_row(&row.cells) {
                Ok(event) => {
                    events.push(event);
                    row_indexes.push(row.index);
                }
                Err(e) => {
                    error!(%date, error = %e, "rejected schedule row");
                    rejected += 1;
                }
            }
        }

        if feed.detail_urls {
            self.capture_detail_urls(&url, &mut events, &row_indexes).await;
        }

        Ok(DatePage { events, rejected })
    }

    /// Navigate to a schedule page and return its HTML once the table (or
    /// the empty-day marker) has rendered.
    async fn load_schedule(&mut self, url: &str) -> PortalResult<String> {
        let ready = self.ready_selector();
        self.load_page(url, Some(&ready)).await
    }

    fn ready_selector(&self) -> String {
        format!("{}, {}", self.portal.row_selector, self.portal.empty_selector)
    }

    /// Follow each bookable row to its registration page.
    async fn capture_detail_urls(&mut self, url: &str, events: &mut [ClassEvent], row_indexes: &[usize]) {
        for (event, &index) in events.iter_mut().zip(row_indexes) {
            if event.available_spots.is_none() {
                continue;
            }

            match self.follow_detail(url, index).await {
                Ok(detail) => {
                    debug!(event = %event.name, url = %detail, "captured booking link");
                    event.detail_url = Some(detail);
                }
                Err(e) => warn!(event = %event.name, error = %e, "couldn't capture booking link"),
            }

            if let Err(e) = self.return_to_schedule(url).await {
                warn!(url, error = %e, "lost the schedule page, remaining rows keep no link");
                break;
            }
        }
    }

    async fn follow_detail(&mut self, url: &str, index: usize) -> PortalResult<String> {
        self.session
            .click_in_row(&self.portal.row_selector, index, &self.portal.detail_click_selector)
            .await?;
        self.wait_for_url_change(url).await
    }

    async fn wait_for_url_change(&mut self, from: &str) -> PortalResult<String> {
        let deadline = Instant::now() + self.timeout();
        loop {
            let current = self.session.current_url().await?;
            if current != from {
                return Ok(current);
            }
            if Instant::now() >= deadline {
                return Err(PortalError::Timeout("booking page".to_string()));
            }
            tokio::time::sleep(URL_POLL_INTERVAL).await;
        }
    }

    /// Back to the schedule table; reload it when history does not get there.
    async fn return_to_schedule(&mut self, url: &str) -> PortalResult<()> {
        let ready = self.ready_selector();
        let timeout = self.timeout();

        if self.session.current_url().await? == url {
            return self.session.wait_for(&ready, timeout).await;
        }

        let back = async {
            self.session.back().await?;
            self.session.wait_for(&ready, timeout).await
        }
        .await;
        if back.is_ok() && self.session.current_url().await? == url {
            return Ok(());
        }

        debug!(url, "history did not return to the schedule, reloading");
        self.session.goto(url).await?;
        self.session.wait_for(&ready, timeout).await
    }

    /// Load `url` under the retry policy, waiting for `ready` when given.
    /// Only transient portal errors are retried.
    async fn load_page(&mut self, url: &str, ready: Option<&str>) -> PortalResult<String> {
        let mut attempts = 0;
        loop {
            match self.try_load(url, ready).await {
                Ok(html) => return Ok(html),
                Err(err) => {
                    attempts += 1;
                    if !err.is_transient() || !self.retry.allows_retry(attempts) {
                        return Err(err);
                    }
                    let delay = self.retry.backoff(attempts - 1);
                    warn!(
                        url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "page load failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_load(&mut self, url: &str, ready: Option<&str>) -> PortalResult<String> {
        let timeout = self.timeout();
        self.session.goto(url).await?;
        match ready {
            Some(css) => {
                self.session.wait_for(css, timeout).await?;
                self.session.page_html().await
            }
            None => Ok(String::new()),
        }
    }

    /// End the browser session.
    pub async fn close(self) -> PortalResult<()> {
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::NaiveTime;

    const POPLAR_DAY: &str = r#"
        <table class="MuiTable-root"><tbody>
          <tr class="MuiTableRow-root">
            <td><img></td>
            <td><span>6:15 AM – 7:15 AM</span><span>1 hour</span></td>
            <td>Power Flow w/ Emma</td>
            <td>Seattle Poplar</td>
            <td><p>35/36 left</p><button>Book</button></td>
          </tr>
          <tr class="MuiTableRow-root">
            <td><img></td>
            <td>6:00 PM – 7:30 PM</td>
            <td>Belay Class</td>
            <td>Seattle Poplar</td>
            <td>Waitlist</td>
          </tr>
        </tbody></table>"#;

    const BROKEN_ROW_DAY: &str = r#"
        <table class="MuiTable-root"><tbody>
          <tr class="MuiTableRow-root">
            <td></td><td>Time TBD</td><td>Mystery Class</td><td>Seattle Poplar</td><td>1/2 left</td>
          </tr>
          <tr class="MuiTableRow-root">
            <td></td><td>9:00 AM – 10:00 AM</td><td>Yoga</td><td>Seattle Poplar</td><td>5/20 left</td>
          </tr>
        </tbody></table>"#;

    /// Scripted browser: pages by URL, booking links by row position.
    #[derive(Default)]
    struct FakeSession {
        pages: HashMap<String, String>,
        details: HashMap<usize, String>,
        failing_loads: HashMap<String, usize>,
        current: String,
        history: Vec<String>,
        broken_back: bool,
        prompt_shown: bool,
        log: Vec<String>,
    }

    #[async_trait]
    impl PortalSession for FakeSession {
        async fn goto(&mut self, url: &str) -> PortalResult<()> {
            self.log.push(format!("goto {url}"));
            if let Some(remaining) = self.failing_loads.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PortalError::Navigation {
                        url: url.to_string(),
                        message: "connection reset".to_string(),
                    });
                }
            }
            let previous = std::mem::replace(&mut self.current, url.to_string());
            self.history.push(previous);
            Ok(())
        }

        async fn wait_for(&mut self, css: &str, _timeout: Duration) -> PortalResult<()> {
            if self.pages.contains_key(&self.current) {
                Ok(())
            } else {
                Err(PortalError::Timeout(css.to_string()))
            }
        }

        async fn page_html(&mut self) -> PortalResult<String> {
            Ok(self.pages.get(&self.current).cloned().unwrap_or_default())
        }

        async fn click_xpath(&mut self, xpath: &str) -> PortalResult<()> {
            if self.prompt_shown {
                self.log.push(format!("click {xpath}"));
                Ok(())
            } else {
                Err(PortalError::NotFound(xpath.to_string()))
            }
        }

        async fn click_in_row(&mut self, _row_selector: &str, index: usize, _target: &str) -> PortalResult<()> {
            self.log.push(format!("click row {index}"));
            let detail = self
                .details
                .get(&index)
                .cloned()
                .ok_or_else(|| PortalError::NotFound(format!("row {index}")))?;
            let previous = std::mem::replace(&mut self.current, detail);
            self.history.push(previous);
            Ok(())
        }

        async fn current_url(&mut self) -> PortalResult<String> {
            Ok(self.current.clone())
        }

        async fn back(&mut self) -> PortalResult<()> {
            if self.broken_back {
                return Err(PortalError::WebDriver("history unavailable".to_string()));
            }
            self.current = self.history.pop().unwrap_or_default();
            Ok(())
        }

        async fn close(self) -> PortalResult<()> {
            Ok(())
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn feed() -> FeedConfig {
        FeedConfig {
            locations: vec!["Seattle Poplar".to_string()],
            ..FeedConfig::default()
        }
    }

    fn url_for(feed: &FeedConfig, d: NaiveDate) -> String {
        schedule_url(&PortalConfig::default(), d, &feed.categories, &feed.locations).unwrap()
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    fn extractor(session: FakeSession) -> Extractor<FakeSession> {
        Extractor::new(session, PortalConfig::default(), quick_retry())
    }

    #[tokio::test]
    async fn scrapes_each_date_in_the_window() {
        let feed = feed();
        let mut session = FakeSession::default();
        session.pages.insert(url_for(&feed, date(1)), POPLAR_DAY.to_string());
        session.pages.insert(url_for(&feed, date(2)), "<p class=\"schedule-empty\">No classes</p>".to_string());

        let scrape = extractor(session).scrape_feed(&feed, date(1), 2).await;

        assert!(scrape.incomplete_dates.is_empty());
        assert_eq!(scrape.events.len(), 2);
        let first_day = &scrape.events.0[&date(1)];
        assert_eq!(first_day[0].name, "Power Flow w/ Emma");
        assert_eq!(first_day[0].start_time, NaiveTime::from_hms_opt(6, 15, 0).unwrap());
        assert_eq!(first_day[0].available_spots, Some(35));
        assert_eq!(first_day[1].available_spots, None);
        assert!(scrape.events.0[&date(2)].is_empty());
    }

    #[tokio::test]
    async fn failed_date_is_incomplete_and_siblings_continue() {
        let feed = feed();
        let mut session = FakeSession::default();
        session.pages.insert(url_for(&feed, date(2)), POPLAR_DAY.to_string());

        let scrape = extractor(session).scrape_feed(&feed, date(1), 2).await;

        assert_eq!(scrape.incomplete_dates, BTreeSet::from([date(1)]));
        assert!(!scrape.events.0.contains_key(&date(1)));
        assert_eq!(scrape.events.0[&date(2)].len(), 2);
    }

    #[tokio::test]
    async fn transient_load_failure_is_retried() {
        let feed = feed();
        let url = url_for(&feed, date(1));
        let mut session = FakeSession::default();
        session.pages.insert(url.clone(), POPLAR_DAY.to_string());
        session.failing_loads.insert(url.clone(), 1);

        let mut extractor = extractor(session);
        let scrape = extractor.scrape_feed(&feed, date(1), 1).await;

        assert!(scrape.incomplete_dates.is_empty());
        let loads = extractor
            .session
            .log
            .iter()
            .filter(|entry| **entry == format!("goto {url}"))
            .count();
        assert_eq!(loads, 2);
    }

    #[tokio::test]
    async fn unreadable_row_marks_date_incomplete_but_keeps_the_rest() {
        let feed = feed();
        let mut session = FakeSession::default();
        session.pages.insert(url_for(&feed, date(1)), BROKEN_ROW_DAY.to_string());

        let scrape = extractor(session).scrape_feed(&feed, date(1), 1).await;

        assert!(scrape.incomplete_dates.contains(&date(1)));
        let events = &scrape.events.0[&date(1)];
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Yoga");
    }

    #[tokio::test]
    async fn captures_booking_links_for_rows_with_availability() {
        let feed = FeedConfig {
            detail_urls: true,
            ..feed()
        };
        let mut session = FakeSession::default();
        session.pages.insert(url_for(&feed, date(1)), POPLAR_DAY.to_string());
        session.details.insert(0, "https://portal.example/book/77".to_string());

        let mut extractor = extractor(session);
        let scrape = extractor.scrape_feed(&feed, date(1), 1).await;

        let events = &scrape.events.0[&date(1)];
        assert_eq!(events[0].detail_url.as_deref(), Some("https://portal.example/book/77"));
        // Waitlisted rows are not followed.
        assert_eq!(events[1].detail_url, None);
        assert!(!extractor.session.log.contains(&"click row 1".to_string()));
        assert_eq!(extractor.session.current, url_for(&feed, date(1)));
    }

    #[tokio::test]
    async fn failed_booking_click_keeps_scanning() {
        let feed = FeedConfig {
            detail_urls: true,
            ..feed()
        };
        let mut session = FakeSession::default();
        session.pages.insert(url_for(&feed, date(1)), BROKEN_ROW_DAY.to_string());
        // Row 1 (Yoga) has no clickable link.

        let scrape = extractor(session).scrape_feed(&feed, date(1), 1).await;

        let events = &scrape.events.0[&date(1)];
        assert_eq!(events[0].name, "Yoga");
        assert_eq!(events[0].detail_url, None);
    }

    #[tokio::test]
    async fn reloads_schedule_when_history_fails() {
        let feed = FeedConfig {
            detail_urls: true,
            ..feed()
        };
        let url = url_for(&feed, date(1));
        let mut session = FakeSession::default();
        session.pages.insert(url.clone(), POPLAR_DAY.to_string());
        session.details.insert(0, "https://portal.example/book/77".to_string());
        session.broken_back = true;

        let mut extractor = extractor(session);
        let scrape = extractor.scrape_feed(&feed, date(1), 1).await;

        assert_eq!(
            scrape.events.0[&date(1)][0].detail_url.as_deref(),
            Some("https://portal.example/book/77")
        );
        assert_eq!(extractor.session.current, url);
    }

    #[tokio::test]
    async fn prepare_dismisses_location_picker() {
        let session = FakeSession {
            prompt_shown: true,
            ..FakeSession::default()
        };

        let mut extractor = extractor(session);
        extractor.prepare().await.unwrap();

        assert_eq!(extractor.session.current, PortalConfig::default().base_url);
        let clicks = extractor
            .session
            .log
            .iter()
            .filter(|entry| entry.starts_with("click //"))
            .count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn missing_location_picker_is_fine() {
        let mut extractor = extractor(FakeSession::default());
        assert!(extractor.prepare().await.is_ok());
    }
}
