//! Error taxonomy shared by sources, sinks and the sync loop.

use thiserror::Error;

/// Failures a source or sink call can report back to the loop driver.
///
/// The driver decides per variant what happens next: `Transport` abandons the
/// rest of the current subject, `Parse` and `Rejected` end that subject's
/// pagination but let the run carry on.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network failure, or a sink refusing a write.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response body was not the JSON we can read.
    #[error("unexpected response shape: {0}")]
    Parse(String),

    /// Upstream answered, but declined the request (e.g. not authorized).
    #[error("upstream rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SyncError {
    /// Whether the error should stop the remaining work for the subject.
    pub fn aborts_subject(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Reasons an item or subject is passed over without failing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingShortcode,
    InvalidShortcode(String),
    MissingUsername,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingShortcode => f.write_str("no shortcode or link"),
            Self::InvalidShortcode(code) => write!(f, "invalid shortcode {code:?}"),
            Self::MissingUsername => f.write_str("no username provided"),
        }
    }
}
