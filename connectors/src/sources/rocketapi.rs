//! RocketAPI Instagram endpoints.

use crate::config::RocketApiConfig;
use crate::error::SyncError;
use crate::sources::envelope::{self, extract_metrics, extract_page};
use crate::sources::{MediaSource, Page};
use chrono::Utc;
use instasync_types::{AccountMetrics, Cursor, Subject};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

const INFO_PATH: &str = "/instagram/user/get_info";
const MEDIA_BY_USERNAME_PATH: &str = "/instagram/user/get_media_by_username";
const MEDIA_BY_ID_PATH: &str = "/instagram/user/get_media";

pub struct RocketApi {
    client: Client,
    api_url: String,
    token: String,
    page_size: u32,
}

impl RocketApi {
    pub fn new(config: &RocketApiConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .user_agent(concat!("instasync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            page_size: config.page_size,
        })
    }

    /// Endpoint path and JSON payload for one media page.
    ///
    /// Subjects with a known user id go through the by-id endpoint; the cursor
    /// is forwarded verbatim as `max_id`.
    pub fn media_request(&self, subject: &Subject, cursor: Option<&Cursor>) -> (&'static str, Value) {
        let (path, mut payload) = match subject.user_id.as_deref() {
            Some(id) => (MEDIA_BY_ID_PATH, json!({ "id": id, "count": self.page_size })),
            None => (
                MEDIA_BY_USERNAME_PATH,
                json!({ "username": subject.username, "count": self.page_size }),
            ),
        };
        if let Some(cursor) = cursor {
            payload["max_id"] = Value::String(cursor.as_str().to_string());
        }
        (path, payload)
    }

    fn post(&self, path: &str, payload: &Value) -> Result<Value, SyncError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, payload = %payload, "rocketapi request");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .json(payload)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        classify(status, &text).map_err(|e| match e {
            SyncError::Transport(msg) => SyncError::Transport(format!("{url}: {msg}")),
            SyncError::Parse(msg) => SyncError::Parse(format!("{url}: {msg}")),
            other => other,
        })
    }
}

/// Maps an HTTP status and raw body onto a JSON body or a [`SyncError`].
///
/// Without a JSON body an error status is a transport failure; with one it is
/// the provider refusing the request.
pub fn classify(status: StatusCode, text: &str) -> Result<Value, SyncError> {
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(SyncError::Transport(format!("HTTP {status}")));
        }
        Err(e) => return Err(SyncError::Parse(e.to_string())),
    };

    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();
        return Err(SyncError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    if let Some(err) = envelope::rejection(&body) {
        return Err(err);
    }
    Ok(body)
}

impl MediaSource for RocketApi {
    fn name(&self) -> &'static str {
        "rocketapi"
    }

    fn fetch_metrics(&self, subject: &Subject) -> Result<AccountMetrics, SyncError> {
        let body = self.post(INFO_PATH, &json!({ "username": subject.username }))?;
        extract_metrics(&body, &subject.username, Utc::now()).ok_or_else(|| {
            SyncError::Parse(format!(
                "no follower count in get_info response for @{}",
                subject.username
            ))
        })
    }

    fn fetch_page(&self, subject: &Subject, cursor: Option<&Cursor>) -> Result<Page, SyncError> {
        let (path, payload) = self.media_request(subject, cursor);
        let body = self.post(path, &payload)?;

        match extract_page(&body) {
            Some((shape, page)) => {
                debug!(
                    username = %subject.username,
                    shape,
                    items = page.items.len(),
                    has_next = page.next_cursor.is_some(),
                    "rocketapi media page"
                );
                Ok(page)
            }
            None => {
                warn!(username = %subject.username, "no known media envelope in response");
                Ok(Page::empty())
            }
        }
    }
}
