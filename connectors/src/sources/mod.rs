pub mod envelope;
pub mod rocketapi;

use crate::error::SyncError;
use instasync_types::{AccountMetrics, Cursor, Subject};
use serde_json::Value;

pub use rocketapi::RocketApi;

/// One page of raw items plus the token for the page after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Upstream provider of account metrics and paginated media.
pub trait MediaSource {
    fn name(&self) -> &'static str;

    /// Summary statistics for the subject; not paginated.
    fn fetch_metrics(&self, subject: &Subject) -> Result<AccountMetrics, SyncError>;

    /// One page of media items. `cursor` is `None` for the first page.
    fn fetch_page(&self, subject: &Subject, cursor: Option<&Cursor>) -> Result<Page, SyncError>;
}
