//! Report sections.
//!
//! Each section loads one counter-group, runs it through the pipeline and
//! writes its text through a [`Renderer`]. Missing input (no files, nothing in
//! the time range) ends the section with a message instead of an error.

mod common;
pub mod connection;
pub mod dbsummary;
pub mod pkgcache;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::diff::Differenced;
use crate::error::{ReportError, Result};
use crate::lob::BlobSource;
use crate::render::Renderer;
use crate::timestamp::TimeRange;

pub use common::required_fields as common_metric_fields;
pub use connection::{Detail, DetailDecision, FixedDecision};
pub use pkgcache::StatementPeak;

/// The available report sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    DbSummary,
    Connection,
    PkgCache,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [Self::DbSummary, Self::Connection, Self::PkgCache];

    pub fn name(self) -> &'static str {
        match self {
            Self::DbSummary => "dbsummary",
            Self::Connection => "connection",
            Self::PkgCache => "pkgcache",
        }
    }

    /// Counter-group the section reads.
    pub fn group(self) -> &'static str {
        match self {
            Self::DbSummary => "MON_GET_DATABASE",
            Self::Connection => "MON_GET_CONNECTION",
            Self::PkgCache => "MON_GET_PKG_CACHE_STMT",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown report '{s}'"))
    }
}

/// Everything a section needs besides the renderer.
#[derive(Debug, Clone)]
pub struct ReportParams {
    /// Directory holding the hourly collection directories.
    pub base: PathBuf,
    pub kind: ReportKind,
    pub range: TimeRange,
    /// Number of buckets between the two samples of an interval.
    pub period: usize,
    /// Keep only these members (empty keeps all).
    pub members: Vec<String>,
    /// Keep only these application handles (connection report).
    pub application_handles: Vec<String>,
}

impl ReportParams {
    pub fn new(base: impl Into<PathBuf>, kind: ReportKind) -> Self {
        Self {
            base: base.into(),
            kind,
            range: TimeRange::default(),
            period: 1,
            members: Vec::new(),
            application_handles: Vec::new(),
        }
    }
}

/// Machine-readable form of what a section rendered.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportData {
    /// Differenced frames, one per context.
    Intervals(Differenced),
    /// Per-statement peak values.
    Statements {
        times: Vec<NaiveDateTime>,
        statements: Vec<StatementPeak>,
    },
}

/// Render the section selected by `params.kind`.
///
/// Returns `Ok(None)` when the section had no input to work with; the reason
/// has already been written to the report.
pub fn run<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    params: &ReportParams,
    decision: &mut dyn DetailDecision,
) -> Result<Option<ReportData>> {
    if params.period == 0 {
        return Err(ReportError::InvalidPeriod(params.period));
    }
    log::debug!("running {} over {}", params.kind, params.base.display());

    let outcome = match params.kind {
        ReportKind::DbSummary => dbsummary::run(r, params),
        ReportKind::Connection => connection::run(r, params, decision),
        ReportKind::PkgCache => pkgcache::run(r, params),
    };

    match outcome {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.is_input_missing() => {
            log::warn!("{}: {e}", params.kind);
            r.line(format!("  {e}"))?;
            r.no_data()?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
