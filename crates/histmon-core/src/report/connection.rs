//! Per-connection report.
//!
//! Rows are keyed by `(APPLICATION_HANDLE, APPLICATION_NAME, APPLICATION_ID)`;
//! members serving the same connection are filled separately, then summed. Besides the per-connection
//! series, the summary counters are compared *across* connections for every
//! interval so a single misbehaving client stands out.

use std::io::Write;

use crate::diff::{Differenced, DifferencedFrame, difference};
use crate::error::Result;
use crate::loader::{LoadOptions, load_group};
use crate::lob::BlobSource;
use crate::normalize::{fold_contexts, normalize};
use crate::render::{Renderer, Separator};
use crate::snapshot::{ContextKey, RecordFilter};

use super::{ReportData, ReportKind, ReportParams, common};

pub const KEY_FIELDS: [&str; 3] = ["APPLICATION_HANDLE", "APPLICATION_NAME", "APPLICATION_ID"];

/// Counters shown for every connection in the summary.
pub const SUMMARY_METRICS: [&str; 5] = [
    "TOTAL_CPU_TIME",
    "TOTAL_ACT_TIME",
    "ACT_COMPLETED_TOTAL",
    "TOTAL_WAIT_TIME",
    "CLIENT_IDLE_WAIT_TIME",
];

/// Prefetch counters the connection group does not collect.
const ASYNC_FIELDS: [&str; 8] = [
    "POOL_ASYNC_DATA_LBP_PAGES_FOUND",
    "POOL_ASYNC_INDEX_LBP_PAGES_FOUND",
    "POOL_ASYNC_XDA_LBP_PAGES_FOUND",
    "POOL_ASYNC_COL_LBP_PAGES_FOUND",
    "POOL_ASYNC_DATA_READS",
    "POOL_ASYNC_INDEX_READS",
    "POOL_ASYNC_XDA_READS",
    "POOL_ASYNC_COL_READS",
];

/// Above this many connections an interactive run asks before printing
/// the full per-connection detail.
pub const PROMPT_ABOVE: usize = 3;

/// How much of the report to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    SummaryOnly,
    Full,
}

/// Chooses the detail level when many connections would be printed.
pub trait DetailDecision {
    /// Called with the number of connections. An `Err` aborts the report.
    fn choose(&mut self, connections: usize) -> Result<Detail>;
}

/// A decision fixed in advance.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Detail);

impl DetailDecision for FixedDecision {
    fn choose(&mut self, _connections: usize) -> Result<Detail> {
        Ok(self.0)
    }
}

fn describe(context: &ContextKey) -> String {
    let part = |i: usize| context.parts().get(i).map(String::as_str).unwrap_or("");
    format!(
        "Connection details: Handle = {}, Name = {}, ID = {}",
        part(0),
        part(1),
        part(2)
    )
}

pub(crate) fn run<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    params: &ReportParams,
    decision: &mut dyn DetailDecision,
) -> Result<ReportData> {
    let mut key = KEY_FIELDS.to_vec();
    key.push("MEMBER");
    let opts = LoadOptions::new(params.range).keyed_by(&key);
    let mut set = load_group(&params.base, ReportKind::Connection.group(), &opts)?;
    for field in ASYNC_FIELDS {
        set.add_zero_column(field);
    }

    let filter = RecordFilter::new()
        .with("MEMBER", &params.members)
        .with("APPLICATION_HANDLE", &params.application_handles);
    let norm = fold_contexts(normalize(set, &filter)?, KEY_FIELDS.len());
    let diff = difference(&norm, params.period)?;
    common::check_fields(&diff, &SUMMARY_METRICS)?;

    let detail = if diff.frames.len() > PROMPT_ABOVE && r.options().sink.is_interactive() {
        decision.choose(diff.frames.len())?
    } else {
        Detail::Full
    };
    log::debug!("{} connections, detail {detail:?}", diff.frames.len());

    r.header("MONREPORT.CONNECTION", &diff.intervals, true)?;
    r.separator(Separator::Double)?;

    r.line("Summary of connections")?;
    r.separator(Separator::Dashed)?;
    for frame in &diff.frames {
        r.separator(Separator::Blank)?;
        r.line(describe(&frame.context))?;
        r.separator(Separator::Blank)?;
        if diff.is_empty() {
            r.no_data()?;
            continue;
        }
        summary(r, &diff, frame)?;
    }
    r.separator(Separator::Double)?;

    if diff.frames.len() > 1 && !diff.is_empty() {
        comparison(r, &diff)?;
        r.separator(Separator::Double)?;
    }

    if detail == Detail::Full {
        r.line("Details for each connection")?;
        r.separator(Separator::Dashed)?;
        for frame in &diff.frames {
            r.separator(Separator::Blank)?;
            r.line(describe(&frame.context))?;
            r.separator(Separator::Dashed)?;
            if diff.is_empty() {
                r.no_data()?;
                continue;
            }
            common::render(r, &diff, frame)?;
        }
        r.separator(Separator::Double)?;
    }

    Ok(ReportData::Intervals(diff))
}

fn summary<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    diff: &Differenced,
    frame: &DifferencedFrame,
) -> Result<()> {
    for metric in SUMMARY_METRICS {
        let idx = diff.position(metric)?;
        r.series(&format!("  {metric}"), &frame.column(idx))?;
    }
    Ok(())
}

/// For each summary counter and interval, one value per connection.
fn comparison<W: Write, S: BlobSource>(r: &mut Renderer<W, S>, diff: &Differenced) -> Result<()> {
    r.line("Comparison across connections")?;
    r.separator(Separator::Dashed)?;
    for (n, frame) in diff.frames.iter().enumerate() {
        let parts = frame.context.parts();
        r.line(format!(
            "  {:>3}: Handle = {}, Name = {}",
            n + 1,
            parts.first().map(String::as_str).unwrap_or(""),
            parts.get(1).map(String::as_str).unwrap_or("")
        ))?;
    }

    for metric in SUMMARY_METRICS {
        let idx = diff.position(metric)?;
        r.separator(Separator::Blank)?;
        r.line(metric)?;
        for i in 0..diff.intervals.len() {
            let across: Vec<f64> = diff.frames.iter().map(|f| f.records[i].num(idx)).collect();
            r.series(&format!("  Interval {:>3}", i + 1), &across)?;
        }
    }
    Ok(())
}
