//! Error types for timetable-sync.
//!
//! Every variant is contained within one cycle: the live snapshot is never
//! modified by a failed cycle and the marker is never advanced by one.

use thiserror::Error;

use timetable_core::TransportKind;
use timetable_source::SourceError;
use timetable_store::{CommitError, StoreError};

/// The remote could not tell us whether anything changed.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("could not fetch latest marker: {0}")]
    Marker(#[source] SourceError),

    #[error("could not fetch changed routes: {0}")]
    ChangedRoutes(#[source] SourceError),
}

/// A full rebuild failed before commit.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source error during rebuild: {0}")]
    Source(#[from] SourceError),

    #[error("store error during rebuild: {0}")]
    Store(#[from] StoreError),

    /// The source listed no categories at all.
    #[error("source listed no transport categories")]
    EmptyListing,

    #[error("rebuild cancelled")]
    Cancelled,
}

/// Applying a change set to a working copy failed before commit.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source error during synchronization: {0}")]
    Source(#[from] SourceError),

    #[error("store error during synchronization: {0}")]
    Store(#[from] StoreError),

    /// The working copy has no category for the announced transport kind.
    #[error("no category for transport kind '{0}' in the snapshot")]
    CategoryNotFound(TransportKind),

    #[error("synchronization cancelled")]
    Cancelled,
}

/// Why a cycle ended without doing its work.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sync(SyncError),

    #[error("snapshot commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("no category for transport kind '{0}' in the snapshot")]
    CategoryNotFound(TransportKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CycleError {
    /// True when the cycle stopped because it was asked to.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CycleError::Build(BuildError::Cancelled) | CycleError::Sync(SyncError::Cancelled)
        )
    }
}

impl From<SyncError> for CycleError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::CategoryNotFound(kind) => CycleError::CategoryNotFound(kind),
            other => CycleError::Sync(other),
        }
    }
}
