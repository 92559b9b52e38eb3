//! Error types for timetable-source.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to fetch or interpret remote timetable data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote could not be reached or returned an unusable response.
    #[error("fetch of {what} failed: {message}")]
    Fetch { what: String, message: String },

    /// A category label outside the translation table.
    #[error("unknown transport label '{0}'")]
    UnknownTransport(String),

    /// The source publishes no update marker.
    #[error("no update marker published")]
    MissingMarker,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listing YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("listing JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    pub fn fetch(what: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Fetch {
            what: what.into(),
            message: message.into(),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
