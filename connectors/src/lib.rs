//! Sources, sinks and the sync loop behind `instasync`.
//!
//! A run reads the tracked accounts from a [`sinks::SubjectStore`], then for
//! each account pulls metrics and pages of media from a
//! [`sources::MediaSource`], normalizes each item and merges it by permalink
//! into a [`sinks::ContentSink`].

pub mod config;
pub mod error;
pub mod normalize;
pub mod parse;
pub mod sinks;
pub mod sources;
pub mod sync;

pub use error::{SkipReason, SyncError};
pub use sync::{RunSummary, SyncOptions, Syncer};
