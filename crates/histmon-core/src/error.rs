//! Error type shared by the loader, the pipeline stages and the report sections.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a report section or a whole invocation.
///
/// Malformed large-object references and missing blob files are *not* errors:
/// the resolver returns an inline diagnostic string for those so the report can
/// still render.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no {0} files found")]
    CollectionNotFound(String),
    #[error("no hourly directory found in {path} for the requested time range")]
    NoHourlyDirectories { path: PathBuf },
    #[error("no collection data available for {0} in the requested time range")]
    NoData(String),
    #[error("{path}: header does not match the other {group} files")]
    SchemaMismatch { group: String, path: PathBuf },
    #[error("{0} is not a valid column name")]
    UnknownField(String),
    #[error("cannot parse timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("start time {start} is after end time {end}")]
    InvalidTimeRange { start: String, end: String },
    #[error("period must be a positive integer, got {0}")]
    InvalidPeriod(usize),
    #[error("collection {group} has class {class}; only SQL collections can be tabulated")]
    UnsupportedCollection { group: String, class: String },
    #[error("aborted: {0}")]
    Aborted(String),
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Missing input that ends one report section without failing the run.
    pub fn is_input_missing(&self) -> bool {
        matches!(
            self,
            Self::CollectionNotFound(_) | Self::NoHourlyDirectories { .. } | Self::NoData(_)
        )
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
