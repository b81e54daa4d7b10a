use anyhow::{anyhow, ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used to turn a shortcode into the post's public permalink.
pub const PERMALINK_PREFIX: &str = "https://www.instagram.com/p/";

pub fn permalink_for(shortcode: &str) -> String {
    format!("{PERMALINK_PREFIX}{shortcode}")
}

/// A tracked Instagram account, as read from the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub username: String,
    /// Numeric Instagram user id, when the accounts table carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Id of the subject's row in the accounts table.
    pub record_id: String,
    /// Spreadsheet range the subject's metrics are appended to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl Subject {
    pub fn new(username: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: None,
            record_id: record_id.into(),
            destination: None,
        }
    }
}

/// Opaque continuation token handed back by a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Carousel,
}

impl MediaKind {
    /// Maps Instagram's numeric `media_type` discriminator.
    pub fn from_discriminator(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Image),
            2 => Some(Self::Video),
            8 => Some(Self::Carousel),
            _ => None,
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Canonical shape of a single post or reel, keyed by `permalink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub permalink: String,
    pub username: String,
    pub shortcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    pub kind: MediaKind,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// ISO-8601 UTC, e.g. `2024-03-01T12:00:00Z`.
    pub post_date: Option<String>,
    pub likes: u64,
    pub comments: u64,
    /// Only populated for video content.
    pub views: Option<u64>,
}

impl PostRecord {
    pub fn natural_key(&self) -> &str {
        &self.permalink
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.permalink.trim().is_empty(),
            "permalink must be a non-empty string"
        );
        ensure!(
            self.permalink.starts_with(PERMALINK_PREFIX),
            "permalink must start with {PERMALINK_PREFIX}"
        );
        ensure!(!self.username.is_empty(), "username must be non-empty");
        if self.views.is_some() && !self.kind.is_video() {
            return Err(anyhow!("views are only valid for video posts"));
        }
        Ok(())
    }
}

/// Point-in-time account statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub username: String,
    pub followers: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_count: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// What a merge did to the destination collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Created,
    Updated,
}
