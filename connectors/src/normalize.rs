//! Maps raw media items from any known upstream shape onto [`PostRecord`].
//!
//! Field aliases are tried in a fixed order. A missing shortcode makes the item
//! a [`Normalized::Skip`]; every other missing field falls back to a default.

use crate::error::SkipReason;
use crate::parse::{
    first_count, first_pointer, first_str, first_text, id_value, iso_utc, parse_timestamp_value,
};
use instasync_types::{permalink_for, MediaKind, PostRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SHORTCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

const SHORTCODE_FIELDS: &[&str] = &["/code", "/shortcode"];
const MEDIA_ID_FIELDS: &[&str] = &["/pk", "/id"];
const LIKE_FIELDS: &[&str] = &[
    "/like_count",
    "/edge_liked_by/count",
    "/edge_media_preview_like/count",
];
const COMMENT_FIELDS: &[&str] = &["/comment_count", "/edge_media_to_comment/count"];
const VIEW_FIELDS: &[&str] = &["/view_count", "/play_count", "/video_view_count"];
const TIMESTAMP_FIELDS: &[&str] = &["/taken_at", "/taken_at_timestamp"];
const DISCRIMINATOR_FIELDS: &[&str] = &["/media_type", "/type"];
const CAPTION_FIELDS: &[&str] = &[
    "/caption/text",
    "/caption",
    "/edge_media_to_caption/edges/0/node/text",
];
const IMAGE_FIELDS: &[&str] = &[
    "/image_versions2/candidates/0/url",
    "/display_url",
    "/thumbnail_src",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(PostRecord),
    Skip(SkipReason),
}

pub fn normalize(raw: &Value, username: &str) -> Normalized {
    let shortcode = match first_str(raw, SHORTCODE_FIELDS) {
        Some(code) => code,
        None => return Normalized::Skip(SkipReason::MissingShortcode),
    };
    if !SHORTCODE_RE.is_match(shortcode) {
        return Normalized::Skip(SkipReason::InvalidShortcode(shortcode.to_string()));
    }

    let kind = media_kind(raw);
    let views = kind
        .is_video()
        .then(|| first_count(raw, VIEW_FIELDS).unwrap_or(0));

    let post_date = first_pointer(raw, TIMESTAMP_FIELDS)
        .and_then(parse_timestamp_value)
        .map(|ts| iso_utc(&ts));

    Normalized::Record(PostRecord {
        permalink: permalink_for(shortcode),
        username: username.to_string(),
        shortcode: shortcode.to_string(),
        media_id: first_pointer(raw, MEDIA_ID_FIELDS).and_then(id_value),
        kind,
        caption: first_text(raw, CAPTION_FIELDS).unwrap_or_default().to_string(),
        image_url: first_str(raw, IMAGE_FIELDS).map(str::to_string),
        post_date,
        likes: first_count(raw, LIKE_FIELDS).unwrap_or(0),
        comments: first_count(raw, COMMENT_FIELDS).unwrap_or(0),
        views,
    })
}

/// An explicit numeric discriminator wins; the softer video hints only apply
/// when the item carries none.
fn media_kind(raw: &Value) -> MediaKind {
    if let Some(kind) = first_pointer(raw, DISCRIMINATOR_FIELDS)
        .and_then(Value::as_i64)
        .and_then(MediaKind::from_discriminator)
    {
        return kind;
    }

    let flagged_video = raw.get("is_video").and_then(Value::as_bool) == Some(true)
        || raw.get("product_type").and_then(Value::as_str) == Some("clips")
        || raw.get("video_versions").is_some();
    if flagged_video {
        MediaKind::Video
    } else if raw.get("carousel_media").is_some() {
        MediaKind::Carousel
    } else {
        MediaKind::Image
    }
}
