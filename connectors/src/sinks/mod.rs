pub mod airtable;
pub mod memory;
pub mod sheets;

use crate::error::SyncError;
use instasync_types::{AccountMetrics, MergeOutcome, PostRecord, Subject};
use tracing::debug;

pub use airtable::Airtable;
pub use memory::{DryRunContentSink, MemoryContentSink, MemoryMetricsSink};
pub use sheets::Sheets;

/// Keyed collection of post records.
pub trait ContentSink {
    /// Id of the entry whose natural key equals `key` exactly.
    fn find_by_key(&self, key: &str) -> Result<Option<String>, SyncError>;

    fn insert(&self, record: &PostRecord) -> Result<String, SyncError>;

    /// Overwrites every field of the entry `id`.
    fn update(&self, id: &str, record: &PostRecord) -> Result<(), SyncError>;
}

/// Destination for per-run account metrics.
pub trait MetricsSink {
    fn name(&self) -> &'static str;

    fn record(&self, subject: &Subject, metrics: &AccountMetrics) -> Result<(), SyncError>;
}

/// Entry of the accounts table; `username` may be missing on hand-edited rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectEntry {
    pub record_id: String,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub destination: Option<String>,
}

impl SubjectEntry {
    pub fn into_subject(self) -> Option<Subject> {
        let username = self.username?.trim().trim_start_matches('@').to_string();
        if username.is_empty() {
            return None;
        }
        Some(Subject {
            username,
            user_id: self.user_id,
            record_id: self.record_id,
            destination: self.destination,
        })
    }
}

/// Where the list of tracked accounts comes from.
pub trait SubjectStore {
    fn list_subjects(&self) -> Result<Vec<SubjectEntry>, SyncError>;
}

/// Upserts `record` by natural key.
///
/// Lookup and write are two separate calls, so two writers racing on the same
/// key can both insert. The job runs as a single sequential writer.
pub fn merge(sink: &dyn ContentSink, record: &PostRecord) -> Result<MergeOutcome, SyncError> {
    match sink.find_by_key(record.natural_key())? {
        Some(id) => {
            sink.update(&id, record)?;
            debug!(permalink = %record.permalink, id = %id, "updated post");
            Ok(MergeOutcome::Updated)
        }
        None => {
            let id = sink.insert(record)?;
            debug!(permalink = %record.permalink, id = %id, "created post");
            Ok(MergeOutcome::Created)
        }
    }
}
