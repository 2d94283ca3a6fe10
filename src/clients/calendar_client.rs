use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::models::event::{CalendarEvent, DayWindow};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("calendar credentials rejected: {0}")]
    Credentials(String),
    #[error("calendar unreachable: {0}")]
    Network(String),
    #[error("calendar service error: {0}")]
    Service(String),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_day(&self, window: &DayWindow) -> Result<Vec<CalendarEvent>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct FeedDocument {
    feed: Option<Feed>,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    entry: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    title: Option<TextValue>,
    #[serde(rename = "gd$when", default)]
    when: Vec<When>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(rename = "$t")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct When {
    #[serde(rename = "startTime")]
    start_time: String,
}

// A private feed is addressed by account name plus the calendar's
// "magic cookie" secret.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    magic_cookie: String,
    timezone: Tz,
}

impl GoogleCalendarClient {
    pub fn new(base_url: &str, username: &str, magic_cookie: &str, timezone: Tz) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            magic_cookie: magic_cookie.to_string(),
            timezone,
        }
    }

    fn feed_url(&self) -> Result<Url, FetchError> {
        let raw = format!(
            "{}/calendar/feeds/{}/private-{}/full",
            self.base_url, self.username, self.magic_cookie
        );
        Url::parse(&raw).map_err(|e| FetchError::Credentials(format!("invalid feed address: {e}")))
    }
}

#[async_trait]
impl EventSource for GoogleCalendarClient {
    async fn fetch_day(&self, window: &DayWindow) -> Result<Vec<CalendarEvent>, FetchError> {
        let start_min = window.start.to_rfc3339();
        let start_max = window.end.to_rfc3339();
        let response = self
            .http
            .get(self.feed_url()?)
            .query(&[
                ("alt", "json"),
                ("start-min", start_min.as_str()),
                ("start-max", start_max.as_str()),
                ("orderby", "starttime"),
                ("sortorder", "ascending"),
                ("singleevents", "true"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Credentials(format!(
                "feed rejected the saved credentials ({status})"
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Service(format!("status {status}: {text}")));
        }

        let document: FeedDocument = serde_json::from_str(&text)
            .map_err(|e| FetchError::Service(format!("unreadable feed body: {e}")))?;

        let mut events = Vec::new();
        for entry in document.feed.map(|f| f.entry).unwrap_or_default() {
            let title = entry.title.map(|t| t.value).unwrap_or_default();
            let Some(raw_start) = entry.when.into_iter().next().map(|w| w.start_time) else {
                warn!(title = %title, "skipping calendar entry without a start time");
                continue;
            };
            let Some(start_time) = parse_start_time(&raw_start, self.timezone) else {
                warn!(title = %title, start = %raw_start, "skipping calendar entry with unreadable start time");
                continue;
            };
            events.push(CalendarEvent { title, start_time });
        }
        // The feed is asked for ascending order; enforce it anyway.
        events.sort_by_key(|event| event.start_time);
        Ok(events)
    }
}

fn parse_start_time(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // All-day events carry a bare date; they start at local midnight.
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).unwrap();
        let local = tz
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive));
        return Some(local.with_timezone(&Utc));
    }
    None
}
