//! In-process sinks for dry runs and tests.

use crate::error::SyncError;
use crate::sinks::{ContentSink, MetricsSink};
use instasync_types::{AccountMetrics, PostRecord, Subject};
use std::cell::RefCell;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryContentSink {
    // (record id, record) in insertion order
    entries: RefCell<Vec<(String, PostRecord)>>,
}

impl MemoryContentSink {
    /// Starts from existing entries, each given a fresh id.
    pub fn with_records(records: impl IntoIterator<Item = PostRecord>) -> Self {
        let sink = Self::default();
        sink.entries
            .borrow_mut()
            .extend(records.into_iter().map(|r| (new_id(), r)));
        sink
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<PostRecord> {
        self.entries
            .borrow()
            .iter()
            .find(|(_, r)| r.natural_key() == key)
            .map(|(_, r)| r.clone())
    }

    pub fn records(&self) -> Vec<PostRecord> {
        self.entries.borrow().iter().map(|(_, r)| r.clone()).collect()
    }
}

impl ContentSink for MemoryContentSink {
    fn find_by_key(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .find(|(_, r)| r.natural_key() == key)
            .map(|(id, _)| id.clone()))
    }

    fn insert(&self, record: &PostRecord) -> Result<String, SyncError> {
        let id = new_id();
        self.entries.borrow_mut().push((id.clone(), record.clone()));
        Ok(id)
    }

    fn update(&self, id: &str, record: &PostRecord) -> Result<(), SyncError> {
        let mut entries = self.entries.borrow_mut();
        let slot = entries
            .iter_mut()
            .find(|(existing, _)| existing == id)
            .ok_or_else(|| SyncError::Transport(format!("no record with id {id}")))?;
        slot.1 = record.clone();
        Ok(())
    }
}

/// Reads through to a real sink but keeps every write in memory.
pub struct DryRunContentSink<'a> {
    inner: &'a dyn ContentSink,
    staged: MemoryContentSink,
    updates: RefCell<Vec<PostRecord>>,
}

impl<'a> DryRunContentSink<'a> {
    pub fn new(inner: &'a dyn ContentSink) -> Self {
        Self {
            inner,
            staged: MemoryContentSink::default(),
            updates: RefCell::new(Vec::new()),
        }
    }

    pub fn would_create(&self) -> Vec<PostRecord> {
        self.staged.records()
    }

    pub fn would_update(&self) -> Vec<PostRecord> {
        self.updates.borrow().clone()
    }
}

impl ContentSink for DryRunContentSink<'_> {
    fn find_by_key(&self, key: &str) -> Result<Option<String>, SyncError> {
        match self.staged.find_by_key(key)? {
            Some(id) => Ok(Some(id)),
            None => self.inner.find_by_key(key),
        }
    }

    fn insert(&self, record: &PostRecord) -> Result<String, SyncError> {
        self.staged.insert(record)
    }

    fn update(&self, id: &str, record: &PostRecord) -> Result<(), SyncError> {
        if self.staged.find_by_key(record.natural_key())?.as_deref() == Some(id) {
            return self.staged.update(id, record);
        }
        self.updates.borrow_mut().push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    snapshots: RefCell<Vec<AccountMetrics>>,
}

impl MemoryMetricsSink {
    pub fn snapshots(&self) -> Vec<AccountMetrics> {
        self.snapshots.borrow().clone()
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn record(&self, _subject: &Subject, metrics: &AccountMetrics) -> Result<(), SyncError> {
        self.snapshots.borrow_mut().push(metrics.clone());
        Ok(())
    }
}

fn new_id() -> String {
    format!("mem{}", Uuid::new_v4().simple())
}
