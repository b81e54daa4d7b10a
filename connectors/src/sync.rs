//! The per-subject job: metrics once, then cursor pagination merged into the
//! content sink.

use crate::error::{SkipReason, SyncError};
use crate::normalize::{normalize, Normalized};
use crate::sinks::{merge, ContentSink, MetricsSink, SubjectEntry};
use crate::sources::MediaSource;
use instasync_types::{AccountMetrics, Cursor, MergeOutcome, Subject};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Caller-imposed ceiling on pages per subject. Unbounded when `None`.
    pub max_pages: Option<usize>,
    pub metrics: bool,
    pub posts: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            metrics: true,
            posts: true,
        }
    }
}

/// Why a subject's pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationEnd {
    /// Upstream stopped handing out cursors.
    #[default]
    Exhausted,
    EmptyPage,
    Rejected,
    Unparseable,
    PageLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSyncStats {
    /// Page fetches issued, including the one that ended the loop.
    pub pages: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub end: PaginationEnd,
}

#[derive(Debug, Clone)]
pub struct SubjectReport {
    pub username: String,
    pub metrics: Option<AccountMetrics>,
    pub posts: Option<PostSyncStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub subjects_synced: usize,
    pub subjects_failed: usize,
    pub subjects_skipped: usize,
    pub pages: usize,
    pub posts_created: usize,
    pub posts_updated: usize,
    pub posts_skipped: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &SubjectReport) {
        self.subjects_synced += 1;
        if let Some(posts) = report.posts.as_ref() {
            self.pages += posts.pages;
            self.posts_created += posts.created;
            self.posts_updated += posts.updated;
            self.posts_skipped += posts.skipped;
        }
    }
}

pub struct Syncer<'a> {
    source: &'a dyn MediaSource,
    content: &'a dyn ContentSink,
    metrics: Vec<&'a dyn MetricsSink>,
    options: SyncOptions,
}

impl<'a> Syncer<'a> {
    pub fn new(
        source: &'a dyn MediaSource,
        content: &'a dyn ContentSink,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            content,
            metrics: Vec::new(),
            options,
        }
    }

    pub fn with_metrics_sink(mut self, sink: &'a dyn MetricsSink) -> Self {
        self.metrics.push(sink);
        self
    }

    /// Walks every subject; a failing subject is logged and the run moves on.
    pub fn run(&self, entries: Vec<SubjectEntry>) -> RunSummary {
        let mut summary = RunSummary::default();

        for entry in entries {
            let record_id = entry.record_id.clone();
            let Some(subject) = entry.into_subject() else {
                warn!(record_id = %record_id, reason = %SkipReason::MissingUsername, "skipping account");
                summary.subjects_skipped += 1;
                continue;
            };

            match self.sync_subject(&subject) {
                Ok(report) => {
                    info!(username = %subject.username, "finished syncing");
                    summary.absorb(&report);
                }
                Err(e) => {
                    error!(username = %subject.username, err = %e, "subject sync failed");
                    summary.subjects_failed += 1;
                }
            }
        }

        summary
    }

    pub fn sync_subject(&self, subject: &Subject) -> Result<SubjectReport, SyncError> {
        let metrics = if self.options.metrics {
            self.sync_metrics(subject)?
        } else {
            None
        };
        let posts = if self.options.posts {
            Some(self.sync_posts(subject)?)
        } else {
            None
        };
        Ok(SubjectReport {
            username: subject.username.clone(),
            metrics,
            posts,
        })
    }

    /// Fetches metrics once and hands them to every metrics sink.
    ///
    /// An unreadable or refused metrics response is logged and yields `None`;
    /// transport failures, upstream or sink side, are returned.
    pub fn sync_metrics(&self, subject: &Subject) -> Result<Option<AccountMetrics>, SyncError> {
        info!(username = %subject.username, source = self.source.name(), "fetching follower count");
        let metrics = match self.source.fetch_metrics(subject) {
            Ok(metrics) => metrics,
            Err(e) if e.aborts_subject() => return Err(e),
            Err(e) => {
                warn!(username = %subject.username, err = %e, "no follower count, skipping metrics");
                return Ok(None);
            }
        };

        for sink in &self.metrics {
            sink.record(subject, &metrics)?;
        }
        Ok(Some(metrics))
    }

    pub fn sync_posts(&self, subject: &Subject) -> Result<PostSyncStats, SyncError> {
        info!(username = %subject.username, "fetching posts");
        let mut stats = PostSyncStats::default();
        let mut cursor: Option<Cursor> = None;

        loop {
            if let Some(limit) = self.options.max_pages {
                if stats.pages >= limit {
                    warn!(username = %subject.username, limit, "page limit reached");
                    stats.end = PaginationEnd::PageLimit;
                    break;
                }
            }

            stats.pages += 1;
            let page = match self.source.fetch_page(subject, cursor.as_ref()) {
                Ok(page) => page,
                Err(e) if e.aborts_subject() => return Err(e),
                Err(e) => {
                    warn!(username = %subject.username, err = %e, "stopping pagination");
                    stats.end = match e {
                        SyncError::Rejected { .. } => PaginationEnd::Rejected,
                        _ => PaginationEnd::Unparseable,
                    };
                    break;
                }
            };

            if page.is_empty() {
                info!(username = %subject.username, "no posts in this batch");
                stats.end = PaginationEnd::EmptyPage;
                break;
            }

            for item in &page.items {
                let record = match normalize(item, &subject.username) {
                    Normalized::Record(record) => record,
                    Normalized::Skip(reason) => {
                        warn!(username = %subject.username, %reason, "skipping post");
                        stats.skipped += 1;
                        continue;
                    }
                };
                match merge(self.content, &record)? {
                    MergeOutcome::Created => stats.created += 1,
                    MergeOutcome::Updated => stats.updated += 1,
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    stats.end = PaginationEnd::Exhausted;
                    break;
                }
            }
        }

        info!(
            username = %subject.username,
            pages = stats.pages,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            "posts synced"
        );
        Ok(stats)
    }
}
