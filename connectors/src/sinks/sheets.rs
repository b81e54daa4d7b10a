//! Google Sheets metrics log: one appended row per subject per run.

use crate::config::SheetsConfig;
use crate::error::SyncError;
use crate::parse::iso_utc;
use crate::sinks::MetricsSink;
use instasync_types::{AccountMetrics, Subject};
use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::info;

pub struct Sheets {
    client: Client,
    api_url: Url,
    spreadsheet_id: String,
    access_token: String,
    default_range: String,
}

impl Sheets {
    pub fn new(config: &SheetsConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .user_agent(concat!("instasync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_url = Url::parse(config.api_url.trim_end_matches('/'))
            .map_err(|e| SyncError::Transport(format!("invalid Sheets URL: {e}")))?;
        Ok(Self {
            client,
            api_url,
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
            default_range: config.default_range.clone(),
        })
    }

    /// The subject's own range when the accounts table names one.
    pub fn range_for<'a>(&'a self, subject: &'a Subject) -> &'a str {
        subject
            .destination
            .as_deref()
            .unwrap_or(self.default_range.as_str())
    }

    fn append_url(&self, range: &str) -> Result<Url, SyncError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Transport(format!("{} cannot be a base URL", self.api_url)))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{range}:append"));
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    pub fn append_row(&self, range: &str, row: Value) -> Result<(), SyncError> {
        let url = self.append_url(range)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [row] }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Transport(format!("sheets HTTP {status}: {body}")));
        }
        Ok(())
    }
}

impl MetricsSink for Sheets {
    fn name(&self) -> &'static str {
        "google-sheets"
    }

    fn record(&self, subject: &Subject, metrics: &AccountMetrics) -> Result<(), SyncError> {
        let range = self.range_for(subject);
        self.append_row(range, metrics_row(metrics))?;
        info!(username = %metrics.username, range, "appended metrics row");
        Ok(())
    }
}

/// `[timestamp, username, followers, following, media_count]`
pub fn metrics_row(metrics: &AccountMetrics) -> Value {
    json!([
        iso_utc(&metrics.checked_at),
        metrics.username,
        metrics.followers,
        metrics.following,
        metrics.media_count,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sheets() -> Sheets {
        Sheets::new(&SheetsConfig {
            api_url: "https://sheets.googleapis.com/v4".to_string(),
            spreadsheet_id: "sheet123".to_string(),
            access_token: "ya29".to_string(),
            default_range: "Followers!A:E".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn append_url_targets_range() {
        let url = sheets().append_url("Followers!A:E").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet123/values/Followers!A:E:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS"
        );
    }

    #[test]
    fn subject_destination_overrides_default_range() {
        let sheets = sheets();
        let mut subject = Subject::new("alice", "rec1");
        assert_eq!(sheets.range_for(&subject), "Followers!A:E");

        subject.destination = Some("Alice!A:E".to_string());
        assert_eq!(sheets.range_for(&subject), "Alice!A:E");
    }

    #[test]
    fn row_layout() {
        let metrics = AccountMetrics {
            username: "alice".to_string(),
            followers: 1520,
            following: None,
            media_count: Some(88),
            checked_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(
            metrics_row(&metrics),
            json!(["2024-03-01T12:00:00Z", "alice", 1520, null, 88])
        );
    }
}
