//! Error types for timetable-store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from opening, staging or querying a snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot has ever been committed at this path.
    #[error("no snapshot at {path}")]
    Absent { path: PathBuf },

    /// Another working copy, possibly in another process, holds the
    /// writer lock.
    #[error("another writer holds {path}")]
    Busy { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value that cannot be mapped back to a domain type.
    #[error("corrupt row in {table}: {message}")]
    Corrupt {
        table: &'static str,
        message: String,
    },
}

/// Failure to promote a working copy. The previous snapshot stays live.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Finishing the staging transaction or closing its connection failed.
    #[error("could not finalize working copy {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Flushing or renaming the staging file failed.
    #[error("could not promote working copy to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
