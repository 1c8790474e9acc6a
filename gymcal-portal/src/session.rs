//! Browser session the extractor drives.

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use gymcal_core::PortalConfig;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{PortalError, PortalResult};

/// Navigation and reads against a live schedule page.
#[async_trait]
pub trait PortalSession: Send {
    async fn goto(&mut self, url: &str) -> PortalResult<()>;

    /// Wait until an element matching `css` is present.
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> PortalResult<()>;

    /// Source of the current page.
    async fn page_html(&mut self) -> PortalResult<String>;

    async fn click_xpath(&mut self, xpath: &str) -> PortalResult<()>;

    /// Click `target` inside the `index`th element matching `row_selector`.
    async fn click_in_row(&mut self, row_selector: &str, index: usize, target: &str) -> PortalResult<()>;

    async fn current_url(&mut self) -> PortalResult<String>;

    async fn back(&mut self) -> PortalResult<()>;

    /// End the browser session.
    async fn close(self) -> PortalResult<()>
    where
        Self: Sized;
}

/// A session on a WebDriver server (chromedriver, geckodriver).
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Start a browser on the configured WebDriver server.
    pub async fn connect(portal: &PortalConfig) -> PortalResult<Self> {
        let chrome_args: Vec<&str> = if portal.headless {
            vec!["--headless=new", "--disable-gpu", "--no-sandbox", "--window-size=1280,2000"]
        } else {
            vec![]
        };
        let firefox_args: Vec<&str> = if portal.headless { vec!["-headless"] } else { vec![] };

        let mut caps = serde_json::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&portal.webdriver_url)
            .await
            .map_err(|e| PortalError::Session(format!("{} ({})", e, portal.webdriver_url)))?;

        let page_load = Duration::from_millis(portal.page_timeout_ms);
        client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_load), None))
            .await?;

        info!(webdriver = %portal.webdriver_url, headless = portal.headless, "browser session started");
        Ok(WebDriverSession { client })
    }
}

#[async_trait]
impl PortalSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> PortalResult<()> {
        debug!(url, "navigating");
        self.client
            .goto(url)
            .await
            .map_err(|e| PortalError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> PortalResult<()> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(css))
            .await
            .map_err(|e| match PortalError::from(e) {
                PortalError::Timeout(_) => PortalError::Timeout(css.to_string()),
                other => other,
            })?;
        Ok(())
    }

    async fn page_html(&mut self) -> PortalResult<String> {
        Ok(self.client.source().await?)
    }

    async fn click_xpath(&mut self, xpath: &str) -> PortalResult<()> {
        let element = self.client.find(Locator::XPath(xpath)).await?;
        element.click().await?;
        Ok(())
    }

    async fn click_in_row(&mut self, row_selector: &str, index: usize, target: &str) -> PortalResult<()> {
        let rows = self.client.find_all(Locator::Css(row_selector)).await?;
        let row = rows
            .into_iter()
            .nth(index)
            .ok_or_else(|| PortalError::NotFound(format!("row {} of '{}'", index, row_selector)))?;
        let element = row.find(Locator::Css(target)).await?;
        element.click().await?;
        Ok(())
    }

    async fn current_url(&mut self) -> PortalResult<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn back(&mut self) -> PortalResult<()> {
        Ok(self.client.back().await?)
    }

    async fn close(self) -> PortalResult<()> {
        self.client.close().await?;
        debug!("browser session closed");
        Ok(())
    }
}
