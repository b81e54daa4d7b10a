//! Airtable REST client: accounts table (subject list + latest metrics), stats
//! log table, and posts table.

use crate::config::AirtableConfig;
use crate::error::SyncError;
use crate::parse::{count_value, id_value, iso_utc};
use crate::sinks::{ContentSink, MetricsSink, SubjectEntry, SubjectStore};
use instasync_types::{AccountMetrics, PostRecord, Subject};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

// ── Field names ─────────────────────────────────────────────────────────

const F_USERNAME: &str = "Username";
const F_USER_ID: &str = "User ID";
const F_SHEET: &str = "Sheet";
const F_POST_LINK: &str = "Post Link";

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

pub struct Airtable {
    client: Client,
    api_key: String,
    base_url: Url,
    accounts_table: String,
    stats_table: String,
    posts_table: String,
}

impl Airtable {
    pub fn new(config: &AirtableConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .user_agent(concat!("instasync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_url = Url::parse(config.api_url.trim_end_matches('/'))
            .map_err(|e| SyncError::Transport(format!("invalid Airtable URL: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: join_segments(&api_url, &[config.base_id.as_str()])?,
            accounts_table: config.accounts_table.clone(),
            stats_table: config.stats_table.clone(),
            posts_table: config.posts_table.clone(),
        })
    }

    fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url, SyncError> {
        match record_id {
            Some(id) => join_segments(&self.base_url, &[table, id]),
            None => join_segments(&self.base_url, &[table]),
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let response = request.bearer_auth(&self.api_key).send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(SyncError::Transport(format!("airtable HTTP {status}: {text}")));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Every record of `table`, following Airtable's `offset` pagination.
    pub fn list_records(
        &self,
        table: &str,
        formula: Option<&str>,
    ) -> Result<Vec<AirtableRecord>, SyncError> {
        let url = self.table_url(table, None)?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self.client.get(url.clone());
            if let Some(formula) = formula {
                request = request.query(&[("filterByFormula", formula)]);
            }
            if let Some(offset) = offset.as_deref() {
                request = request.query(&[("offset", offset)]);
            }

            let page: ListResponse = self.send(request)?;
            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(table, count = records.len(), "listed airtable records");
        Ok(records)
    }

    fn create(&self, table: &str, fields: Value) -> Result<AirtableRecord, SyncError> {
        let url = self.table_url(table, None)?;
        self.send(
            self.client
                .post(url)
                .json(&json!({ "fields": fields, "typecast": true })),
        )
    }

    fn patch(&self, table: &str, id: &str, fields: Value) -> Result<AirtableRecord, SyncError> {
        let url = self.table_url(table, Some(id))?;
        self.send(
            self.client
                .patch(url)
                .json(&json!({ "fields": fields, "typecast": true })),
        )
    }

    /// Point update of the account row.
    pub fn update_account(&self, record_id: &str, metrics: &AccountMetrics) -> Result<(), SyncError> {
        self.patch(&self.accounts_table, record_id, account_fields(metrics))?;
        info!(username = %metrics.username, followers = metrics.followers, "airtable account updated");
        Ok(())
    }

    /// Append-only history row in the stats table.
    pub fn log_metrics(&self, metrics: &AccountMetrics) -> Result<(), SyncError> {
        self.create(&self.stats_table, stats_fields(metrics))?;
        info!(username = %metrics.username, "logged follower count");
        Ok(())
    }
}

impl SubjectStore for Airtable {
    fn list_subjects(&self) -> Result<Vec<SubjectEntry>, SyncError> {
        Ok(self
            .list_records(&self.accounts_table, None)?
            .into_iter()
            .map(subject_entry)
            .collect())
    }
}

impl MetricsSink for Airtable {
    fn name(&self) -> &'static str {
        "airtable"
    }

    fn record(&self, subject: &Subject, metrics: &AccountMetrics) -> Result<(), SyncError> {
        self.update_account(&subject.record_id, metrics)?;
        self.log_metrics(metrics)
    }
}

impl ContentSink for Airtable {
    fn find_by_key(&self, key: &str) -> Result<Option<String>, SyncError> {
        let formula = link_formula(key);
        let records = self.list_records(&self.posts_table, Some(&formula))?;
        Ok(records.into_iter().next().map(|r| r.id))
    }

    fn insert(&self, record: &PostRecord) -> Result<String, SyncError> {
        Ok(self.create(&self.posts_table, post_fields(record))?.id)
    }

    fn update(&self, id: &str, record: &PostRecord) -> Result<(), SyncError> {
        self.patch(&self.posts_table, id, post_fields(record))?;
        Ok(())
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, SyncError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| SyncError::Transport(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ── Payloads ────────────────────────────────────────────────────────────

/// `{Post Link} = '<permalink>'`, with the literal escaped for Airtable's
/// formula language.
pub fn link_formula(permalink: &str) -> String {
    let escaped = permalink.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{F_POST_LINK}}} = '{escaped}'")
}

/// Every column the job owns, so a PATCH with this payload leaves nothing stale.
/// A post without an image clears the attachment column.
pub fn post_fields(record: &PostRecord) -> Value {
    let image = match record.image_url.as_deref() {
        Some(url) => json!([{ "url": url }]),
        None => json!([]),
    };
    json!({
        "Username": [record.username],
        "Caption": record.caption,
        "Post Date": record.post_date,
        "Post Link": record.permalink,
        "Likes": record.likes,
        "Comments": record.comments,
        "Views": record.views,
        "Image": image,
    })
}

pub fn account_fields(metrics: &AccountMetrics) -> Value {
    json!({
        "Latest Followers": metrics.followers,
        "Last Checked": iso_utc(&metrics.checked_at),
    })
}

pub fn stats_fields(metrics: &AccountMetrics) -> Value {
    json!({
        "Username": [metrics.username],
        "Follower Count": metrics.followers,
        "Timestamp": iso_utc(&metrics.checked_at),
    })
}

fn subject_entry(record: AirtableRecord) -> SubjectEntry {
    let text = |key: &str| {
        record
            .fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    SubjectEntry {
        username: text(F_USERNAME),
        destination: text(F_SHEET),
        user_id: record.fields.get(F_USER_ID).and_then(|v| {
            // numeric ids arrive as floats from number fields
            count_value(v).map(|n| n.to_string()).or_else(|| id_value(v))
        }),
        record_id: record.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use instasync_types::{permalink_for, MediaKind};

    fn config() -> AirtableConfig {
        AirtableConfig {
            api_url: "https://api.airtable.com/v0".to_string(),
            api_key: "key".to_string(),
            base_id: "appBASE".to_string(),
            accounts_table: "Instagram Statistics".to_string(),
            stats_table: "Instagram FC".to_string(),
            posts_table: "Instagram Posts".to_string(),
        }
    }

    fn metrics() -> AccountMetrics {
        AccountMetrics {
            username: "alice".to_string(),
            followers: 1520,
            following: Some(10),
            media_count: None,
            checked_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn table_urls_encode_names() {
        let airtable = Airtable::new(&config()).unwrap();
        let url = airtable.table_url("Instagram Posts", Some("rec123")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBASE/Instagram%20Posts/rec123"
        );
    }

    #[test]
    fn formula_escapes_quotes() {
        assert_eq!(
            link_formula("https://www.instagram.com/p/abc"),
            "{Post Link} = 'https://www.instagram.com/p/abc'"
        );
        assert_eq!(link_formula("it's"), "{Post Link} = 'it\\'s'");
    }

    #[test]
    fn post_payload_matches_table_columns() {
        let record = PostRecord {
            permalink: permalink_for("C0ffee"),
            username: "alice".to_string(),
            shortcode: "C0ffee".to_string(),
            media_id: None,
            kind: MediaKind::Video,
            caption: "clip".to_string(),
            image_url: Some("https://cdn.example/a.jpg".to_string()),
            post_date: Some("2024-03-01T12:00:00Z".to_string()),
            likes: 3,
            comments: 1,
            views: Some(50),
        };
        let fields = post_fields(&record);
        assert_eq!(fields["Username"], json!(["alice"]));
        assert_eq!(fields["Post Link"], json!("https://www.instagram.com/p/C0ffee"));
        assert_eq!(fields["Views"], json!(50));
        assert_eq!(fields["Image"], json!([{ "url": "https://cdn.example/a.jpg" }]));

        let mut image = record;
        image.views = None;
        image.image_url = None;
        let fields = post_fields(&image);
        assert!(fields["Views"].is_null());
        assert_eq!(fields["Image"], json!([]));
    }

    #[test]
    fn update_payload_clears_a_dropped_image() {
        let mut record = PostRecord {
            permalink: permalink_for("abc"),
            username: "alice".to_string(),
            shortcode: "abc".to_string(),
            media_id: None,
            kind: MediaKind::Image,
            caption: String::new(),
            image_url: Some("https://cdn.example/old.jpg".to_string()),
            post_date: None,
            likes: 0,
            comments: 0,
            views: None,
        };
        let before = post_fields(&record);
        record.image_url = None;
        let after = post_fields(&record);

        let before_keys: Vec<&String> = before.as_object().unwrap().keys().collect();
        let after_keys: Vec<&String> = after.as_object().unwrap().keys().collect();
        assert_eq!(before_keys, after_keys);
        assert_eq!(after["Image"], json!([]));
        assert!(after["Post Date"].is_null());
    }

    #[test]
    fn metrics_payloads() {
        let account = account_fields(&metrics());
        assert_eq!(account["Latest Followers"], json!(1520));
        assert_eq!(account["Last Checked"], json!("2024-03-01T12:00:00Z"));

        let stats = stats_fields(&metrics());
        assert_eq!(stats["Username"], json!(["alice"]));
        assert_eq!(stats["Follower Count"], json!(1520));
    }

    #[test]
    fn account_rows_become_entries() {
        let record: AirtableRecord = serde_json::from_value(json!({
            "id": "rec1",
            "fields": { "Username": "alice", "User ID": 25025320.0, "Sheet": "Alice!A:E" }
        }))
        .unwrap();
        let entry = subject_entry(record);
        assert_eq!(entry.username.as_deref(), Some("alice"));
        assert_eq!(entry.user_id.as_deref(), Some("25025320"));
        assert_eq!(entry.destination.as_deref(), Some("Alice!A:E"));

        let bare: AirtableRecord = serde_json::from_value(json!({ "id": "rec2" })).unwrap();
        assert_eq!(subject_entry(bare).username, None);
    }
}
