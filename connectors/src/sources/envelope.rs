//! Known RocketAPI response envelopes.
//!
//! The provider has moved its payload around between versions, so each layout
//! is a named strategy and they are tried in priority order. The first strategy
//! that yields a non-empty result wins, including for where the cursor lives.

use crate::error::SyncError;
use crate::parse::{first_count, id_value};
use crate::sources::Page;
use chrono::{DateTime, Utc};
use instasync_types::{AccountMetrics, Cursor};
use serde_json::Value;

pub struct MediaEnvelope {
    pub name: &'static str,
    extract: fn(&Value) -> Option<Page>,
}

impl MediaEnvelope {
    pub fn extract(&self, body: &Value) -> Option<Page> {
        (self.extract)(body).filter(|page| !page.is_empty())
    }
}

pub const MEDIA_ENVELOPES: &[MediaEnvelope] = &[
    MediaEnvelope {
        name: "data.items",
        extract: data_items,
    },
    MediaEnvelope {
        name: "response.body.items",
        extract: response_body_items,
    },
    MediaEnvelope {
        name: "response.body.data.user.edge_owner_to_timeline_media",
        extract: timeline_edges,
    },
];

/// Runs the media strategies in order; `None` when no known shape matched.
pub fn extract_page(body: &Value) -> Option<(&'static str, Page)> {
    MEDIA_ENVELOPES
        .iter()
        .find_map(|envelope| envelope.extract(body).map(|page| (envelope.name, page)))
}

fn data_items(body: &Value) -> Option<Page> {
    let items = body.pointer("/data/items")?.as_array()?.clone();
    Some(Page {
        items,
        next_cursor: paged_cursor(body, "/data/more_available", "/data/next_max_id"),
    })
}

fn response_body_items(body: &Value) -> Option<Page> {
    let items = body.pointer("/response/body/items")?.as_array()?.clone();
    Some(Page {
        items,
        next_cursor: paged_cursor(
            body,
            "/response/body/more_available",
            "/response/body/next_max_id",
        ),
    })
}

fn timeline_edges(body: &Value) -> Option<Page> {
    let media = body.pointer("/response/body/data/user/edge_owner_to_timeline_media")?;
    let items = media
        .get("edges")?
        .as_array()?
        .iter()
        .filter_map(|edge| edge.get("node"))
        .cloned()
        .collect();
    Some(Page {
        items,
        next_cursor: paged_cursor(
            media,
            "/page_info/has_next_page",
            "/page_info/end_cursor",
        ),
    })
}

/// Cursor at `cursor_ptr`, unless the flag at `more_ptr` is explicitly false.
fn paged_cursor(value: &Value, more_ptr: &str, cursor_ptr: &str) -> Option<Cursor> {
    if value.pointer(more_ptr).and_then(Value::as_bool) == Some(false) {
        return None;
    }
    value
        .pointer(cursor_ptr)
        .and_then(id_value)
        .map(Cursor::new)
}

// ── Account metrics ─────────────────────────────────────────────────────

/// Where the user object sits, in priority order.
pub const USER_ENVELOPES: &[(&str, &str)] = &[
    ("response.body.data.user", "/response/body/data/user"),
    ("data.user", "/data/user"),
    ("response.body.user", "/response/body/user"),
];

const FOLLOWER_FIELDS: &[&str] = &["/edge_followed_by/count", "/follower_count"];
const FOLLOWING_FIELDS: &[&str] = &["/edge_follow/count", "/following_count"];
const MEDIA_COUNT_FIELDS: &[&str] = &["/edge_owner_to_timeline_media/count", "/media_count"];

pub fn extract_metrics(
    body: &Value,
    username: &str,
    checked_at: DateTime<Utc>,
) -> Option<AccountMetrics> {
    USER_ENVELOPES.iter().find_map(|(_, ptr)| {
        let user = body.pointer(ptr).filter(|u| u.is_object())?;
        let followers = first_count(user, FOLLOWER_FIELDS)?;
        Some(AccountMetrics {
            username: username.to_string(),
            followers,
            following: first_count(user, FOLLOWING_FIELDS),
            media_count: first_count(user, MEDIA_COUNT_FIELDS),
            checked_at,
        })
    })
}

// ── Refusals ────────────────────────────────────────────────────────────

/// Detects a well-formed body that reports failure rather than data.
pub fn rejection(body: &Value) -> Option<SyncError> {
    let message = || {
        body.get("message")
            .or_else(|| body.pointer("/response/body/message"))
            .and_then(Value::as_str)
            .unwrap_or("request refused")
            .to_string()
    };

    if let Some(code) = body
        .pointer("/response/status_code")
        .and_then(Value::as_u64)
        .filter(|code| !(200..300).contains(code))
    {
        return Some(SyncError::Rejected {
            status: u16::try_from(code).unwrap_or(u16::MAX),
            message: message(),
        });
    }

    if body.get("status").and_then(Value::as_str) == Some("error") {
        return Some(SyncError::Rejected {
            status: 200,
            message: message(),
        });
    }

    None
}
