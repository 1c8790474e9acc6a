//! Google Calendar v3 REST client.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use gymcal_core::{
    CalendarConfig, CalendarService, EventBody, EventPage, GymCalError, GymCalResult,
    RemoteCalendar,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::types::{AclRule, CalendarList, Created, EventList, GoogleEvent, NewCalendar, NewEvent};

const PAGE_SIZE: &str = "250";

pub struct GoogleCalendar {
    http: reqwest::Client,
    api_base: String,
    embed_base: String,
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(config: &CalendarConfig, access_token: impl Into<String>) -> Self {
        GoogleCalendar {
            http: reqwest::Client::new(),
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            embed_base: config.embed_base_url.clone(),
            access_token: access_token.into(),
        }
    }

    /// API URL with each segment percent-encoded (holiday calendar ids contain `#`).
    fn endpoint(&self, segments: &[&str]) -> GymCalResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| GymCalError::Config(format!("invalid calendar API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GymCalError::Config("calendar API URL cannot take a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> GymCalResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url).bearer_auth(&self.access_token))
    }

    async fn send(&self, request: RequestBuilder) -> GymCalResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GymCalError::remote(Some(status.as_u16()), api_message(&body, status)))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GymCalResult<T> {
        let response = self.send(request).await?;
        let text = response.text().await.map_err(transport_error)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn transport_error(err: reqwest::Error) -> GymCalError {
    GymCalError::remote(err.status().map(|s| s.as_u16()), err.to_string())
}

/// Google wraps failures as `{"error": {"message": ...}}`.
fn api_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{} {}", status, body.trim()))
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn list_calendars(&self) -> GymCalResult<Vec<RemoteCalendar>> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &["users", "me", "calendarList"])?
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: CalendarList = self.send_json(request).await?;
            calendars.extend(page.items.into_iter().map(RemoteCalendar::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = calendars.len(), "listed calendars");
        Ok(calendars)
    }

    async fn create_calendar(&self, summary: &str, time_zone: Tz) -> GymCalResult<RemoteCalendar> {
        let request = self.request(Method::POST, &["calendars"])?.json(&NewCalendar {
            summary,
            time_zone: time_zone.name(),
        });
        let created: Created = self.send_json(request).await?;

        Ok(RemoteCalendar {
            id: created.id,
            summary: summary.to_string(),
        })
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> GymCalResult<EventPage> {
        let mut request = self
            .request(Method::GET, &["calendars", calendar_id, "events"])?
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true).as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let page: EventList = self.send_json(request).await?;

        Ok(EventPage {
            items: page
                .items
                .into_iter()
                .filter_map(GoogleEvent::into_remote)
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    async fn insert_event(&self, calendar_id: &str, event: &EventBody) -> GymCalResult<String> {
        let request = self
            .request(Method::POST, &["calendars", calendar_id, "events"])?
            .json(&NewEvent::from(event));
        let created: Created = self.send_json(request).await?;
        Ok(created.id)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> GymCalResult<()> {
        let request = self.request(Method::DELETE, &["calendars", calendar_id, "events", event_id])?;
        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(GymCalError::Remote {
                status: Some(404 | 410),
                ..
            }) => {
                debug!(calendar_id, event_id, "event already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn make_public(&self, calendar_id: &str) -> GymCalResult<()> {
        let request = self
            .request(Method::POST, &["calendars", calendar_id, "acl"])?
            .json(&AclRule::public_reader());
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, calendar_id: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(calendar_id.as_bytes()).collect();
        format!("{}?src={}", self.embed_base, encoded)
    }
}
