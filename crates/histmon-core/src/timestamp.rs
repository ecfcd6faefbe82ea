//! Collection timestamps and report time ranges.
//!
//! Snapshot rows carry `COLLECTION_TIME` in the collector's own layout
//! (`2024-03-01-10.15.00.123456`). Users may pass range bounds either in that
//! layout (copied straight out of a file) or as an ordinary date-time.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

use crate::error::{ReportError, Result};

/// Layout of `COLLECTION_TIME` values inside snapshot files.
pub const COLLECTION_TIME_FORMAT: &str = "%Y-%m-%d-%H.%M.%S%.f";

/// Generic layouts accepted for `--start-time` / `--end-time`.
const BOUND_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

static HOURLY_DIR_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{10})$").expect("static regex"));
static FILE_MINUTE_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{12}").expect("static regex"));

/// Parse a `COLLECTION_TIME` cell, dropping sub-second precision.
///
/// Collectors on different members stamp the same cycle a few microseconds
/// apart; flooring to whole seconds puts them in the same time bucket.
pub fn parse_collection_time(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, COLLECTION_TIME_FORMAT)
        .ok()
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| ReportError::InvalidTimestamp(raw.to_string()))
}

/// Parse a user-supplied range bound in any accepted layout.
pub fn parse_time_bound(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in BOUND_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(t);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t);
        }
    }
    NaiveDateTime::parse_from_str(raw, COLLECTION_TIME_FORMAT)
        .map_err(|_| ReportError::InvalidTimestamp(raw.to_string()))
}

/// Format a bucket timestamp the way it is listed in report headers.
pub fn display_time(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Time range
// ---------------------------------------------------------------------------

/// Inclusive time window; an absent bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ReportError::InvalidTimeRange {
                    start: display_time(&s),
                    end: display_time(&e),
                });
            }
        }
        Ok(Self { start, end })
    }

    /// Parse optional bounds from their textual form.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start.map(parse_time_bound).transpose()?;
        let end = end.map(parse_time_bound).transpose()?;
        Self::new(start, end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, t: &NaiveDateTime) -> bool {
        self.start.is_none_or(|s| *t >= s) && self.end.is_none_or(|e| *t <= e)
    }

    /// Whether `[from, from + len)` shares any instant with the range.
    pub fn overlaps(&self, from: NaiveDateTime, len: Duration) -> bool {
        let until = from + len;
        self.start.is_none_or(|s| until > s) && self.end.is_none_or(|e| from <= e)
    }
}

// ---------------------------------------------------------------------------
// Stamps embedded in directory and file names
// ---------------------------------------------------------------------------

/// Hour encoded in an hourly collection directory name (`<prefix>_YYYYMMDDHH`).
pub fn hourly_dir_stamp(name: &str) -> Option<NaiveDateTime> {
    let caps = HOURLY_DIR_STAMP.captures(name)?;
    NaiveDateTime::parse_from_str(&format!("{}00", &caps[1]), "%Y%m%d%H%M").ok()
}

/// Minute encoded in a snapshot file name (first `YYYYMMDDHHMM` run).
pub fn file_minute_stamp(name: &str) -> Option<NaiveDateTime> {
    let m = FILE_MINUTE_STAMP.find(name)?;
    NaiveDateTime::parse_from_str(m.as_str(), "%Y%m%d%H%M").ok()
}
