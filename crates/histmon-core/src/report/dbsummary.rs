//! Database-wide summary: every member summed into one context.
//!
//! Members are normalized as separate contexts first, so a member that missed
//! a cycle contributes its last value instead of dropping out of the total.

use std::io::Write;

use crate::diff::difference;
use crate::error::Result;
use crate::loader::{LoadOptions, load_group};
use crate::lob::BlobSource;
use crate::normalize::{fold_contexts, normalize};
use crate::render::{Renderer, Separator};
use crate::snapshot::RecordFilter;

use super::{ReportData, ReportKind, ReportParams, common};

pub(crate) fn run<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    params: &ReportParams,
) -> Result<ReportData> {
    let set = load_group(
        &params.base,
        ReportKind::DbSummary.group(),
        &LoadOptions::new(params.range).keyed_by(&["MEMBER"]),
    )?;
    let filter = RecordFilter::new().with("MEMBER", &params.members);
    let norm = fold_contexts(normalize(set, &filter)?, 0);
    let diff = difference(&norm, params.period)?;
    common::check_fields(&diff, &[])?;

    r.header("MONREPORT.DBSUMMARY", &diff.intervals, true)?;
    r.separator(Separator::Double)?;
    match diff.frames.first() {
        Some(frame) if !diff.is_empty() => common::render(r, &diff, frame)?,
        _ => r.no_data()?,
    }
    r.separator(Separator::Double)?;

    Ok(ReportData::Intervals(diff))
}
