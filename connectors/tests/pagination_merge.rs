use chrono::Utc;
use connectors::sinks::{ContentSink, MemoryContentSink, MemoryMetricsSink, SubjectEntry};
use connectors::sources::envelope::extract_page;
use connectors::sources::{MediaSource, Page};
use connectors::sync::PaginationEnd;
use connectors::{SyncError, SyncOptions, Syncer};
use instasync_types::{permalink_for, AccountMetrics, Cursor, MediaKind, PostRecord, Subject};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// Serves raw RocketAPI bodies keyed by the cursor they answer.
struct RecordedUpstream {
    bodies: HashMap<Option<String>, Value>,
    calls: RefCell<Vec<Option<String>>>,
}

impl RecordedUpstream {
    fn new(bodies: Vec<(Option<&str>, Value)>) -> Self {
        Self {
            bodies: bodies
                .into_iter()
                .map(|(k, v)| (k.map(str::to_string), v))
                .collect(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl MediaSource for RecordedUpstream {
    fn name(&self) -> &'static str {
        "recorded"
    }

    fn fetch_metrics(&self, subject: &Subject) -> Result<AccountMetrics, SyncError> {
        Ok(AccountMetrics {
            username: subject.username.clone(),
            followers: 1520,
            following: Some(310),
            media_count: Some(2),
            checked_at: Utc::now(),
        })
    }

    fn fetch_page(&self, _subject: &Subject, cursor: Option<&Cursor>) -> Result<Page, SyncError> {
        let key = cursor.map(|c| c.as_str().to_string());
        self.calls.borrow_mut().push(key.clone());
        let body = self
            .bodies
            .get(&key)
            .ok_or_else(|| SyncError::Transport(format!("unexpected cursor {key:?}")))?;
        Ok(extract_page(body).map(|(_, page)| page).unwrap_or_default())
    }
}

fn existing_post(code: &str) -> PostRecord {
    PostRecord {
        permalink: permalink_for(code),
        username: "alice".to_string(),
        shortcode: code.to_string(),
        media_id: None,
        kind: MediaKind::Image,
        caption: "old caption".to_string(),
        image_url: None,
        post_date: None,
        likes: 1,
        comments: 0,
        views: None,
    }
}

#[test]
fn alice_one_new_one_existing_two_fetches() {
    let upstream = RecordedUpstream::new(vec![
        (
            None,
            json!({
                "data": {
                    "items": [
                        { "code": "NewOne", "media_type": 2, "view_count": 50, "like_count": 4 },
                        { "code": "Known", "media_type": 1, "like_count": 99, "caption": { "text": "edited" } }
                    ],
                    "next_max_id": "X"
                }
            }),
        ),
        (Some("X"), json!({ "data": { "items": [] } })),
    ]);
    let sink = MemoryContentSink::with_records([existing_post("Known")]);
    let metrics = MemoryMetricsSink::default();

    let summary = Syncer::new(&upstream, &sink, SyncOptions::default())
        .with_metrics_sink(&metrics)
        .run(vec![SubjectEntry {
            record_id: "recAlice".into(),
            username: Some("alice".into()),
            ..Default::default()
        }]);

    assert_eq!(summary.posts_created, 1);
    assert_eq!(summary.posts_updated, 1);
    assert_eq!(summary.pages, 2);
    assert_eq!(*upstream.calls.borrow(), vec![None, Some("X".to_string())]);

    assert_eq!(sink.len(), 2);
    let known = sink.get(&permalink_for("Known")).unwrap();
    assert_eq!(known.likes, 99);
    assert_eq!(known.caption, "edited");
    let new = sink.get(&permalink_for("NewOne")).unwrap();
    assert_eq!(new.views, Some(50));

    assert_eq!(metrics.snapshots()[0].followers, 1520);
}

#[test]
fn unknown_envelope_ends_pagination_quietly() {
    let upstream = RecordedUpstream::new(vec![(None, json!({ "unexpected": true }))]);
    let sink = MemoryContentSink::default();
    let options = SyncOptions {
        metrics: false,
        ..Default::default()
    };

    let stats = Syncer::new(&upstream, &sink, options)
        .sync_posts(&Subject::new("alice", "recAlice"))
        .unwrap();
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.end, PaginationEnd::EmptyPage);
    assert!(sink.is_empty());
}

#[test]
fn rerunning_the_same_pages_only_updates() {
    let body = json!({
        "response": { "status_code": 200, "body": {
            "items": [{ "code": "a" }, { "code": "b" }, { "pk": 7 }],
            "more_available": false
        } }
    });
    let upstream = RecordedUpstream::new(vec![(None, body)]);
    let sink = MemoryContentSink::default();
    let options = SyncOptions {
        metrics: false,
        ..Default::default()
    };
    let subject = Subject::new("alice", "recAlice");
    let syncer = Syncer::new(&upstream, &sink, options);

    let first = syncer.sync_posts(&subject).unwrap();
    let second = syncer.sync_posts(&subject).unwrap();

    assert_eq!((first.created, first.updated, first.skipped), (2, 0, 1));
    assert_eq!((second.created, second.updated, second.skipped), (0, 2, 1));
    assert_eq!(sink.len(), 2);
    assert!(sink.find_by_key(&permalink_for("a")).unwrap().is_some());
}
