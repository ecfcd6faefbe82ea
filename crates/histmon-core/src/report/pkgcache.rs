//! Package cache report: top statements by peak resource use.
//!
//! Statement counters are cumulative while the statement stays cached, so the
//! peak of the member-summed value over the window is the statement's usage.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::Result;
use crate::loader::{LoadOptions, load_group};
use crate::lob::BlobSource;
use crate::normalize::{Normalized, NormalizedFrame, fold_contexts, normalize};
use crate::render::{Renderer, Separator, Table, format_number, truncate};
use crate::snapshot::{RecordFilter, Value, key_text};
use crate::timestamp::display_time;

use super::{ReportData, ReportKind, ReportParams};

pub const TOP_N: usize = 10;
const TEXT_FIELD: &str = "STMT_TEXT";

/// Counter sums tracked per statement, by name.
const QUANTITIES: &[(&str, &[&str])] = &[
    ("TOTAL_CPU_TIME", &["TOTAL_CPU_TIME"]),
    ("TOTAL_ACT_WAIT_TIME", &["TOTAL_ACT_WAIT_TIME"]),
    ("LOCK_WAIT_TIME", &["LOCK_WAIT_TIME"]),
    ("ROWS_READ+ROWS_MODIFIED", &["ROWS_READ", "ROWS_MODIFIED"]),
    ("NUM_EXECUTIONS", &["NUM_EXECUTIONS"]),
    (
        "IO_WAIT_TIME",
        &["POOL_READ_TIME", "POOL_WRITE_TIME", "DIRECT_READ_TIME", "DIRECT_WRITE_TIME"],
    ),
];

const EXECUTIONS: &str = "NUM_EXECUTIONS";

struct Ranking {
    title: &'static str,
    column: &'static str,
    quantity: &'static str,
    per_exec: bool,
    with_lock_wait: bool,
}

#[rustfmt::skip]
const RANKINGS: &[Ranking] = &[
    Ranking { title: "Top 10 statements by TOTAL_CPU_TIME", column: "TOTAL_CPU_TIME", quantity: "TOTAL_CPU_TIME", per_exec: false, with_lock_wait: false },
    Ranking { title: "Top 10 statements by TOTAL_CPU_TIME per exec", column: "TOTAL_CPU_TIME", quantity: "TOTAL_CPU_TIME", per_exec: true, with_lock_wait: false },
    Ranking { title: "Top 10 statements by TOTAL_ACT_WAIT_TIME", column: "TOTAL_ACT_WAIT_TIME", quantity: "TOTAL_ACT_WAIT_TIME", per_exec: false, with_lock_wait: true },
    Ranking { title: "Top 10 statements by TOTAL_ACT_WAIT_TIME per exec", column: "TOTAL_ACT_WAIT_TIME", quantity: "TOTAL_ACT_WAIT_TIME", per_exec: true, with_lock_wait: true },
    Ranking { title: "Top 10 statements by ROWS_READ + ROWS_MODIFIED", column: "ROWS_READ+ROWS_MODIFIED", quantity: "ROWS_READ+ROWS_MODIFIED", per_exec: false, with_lock_wait: false },
    Ranking { title: "Top 10 statements by ROWS_READ + ROWS_MODIFIED per exec", column: "ROWS_READ+ROWS_MODIFIED", quantity: "ROWS_READ+ROWS_MODIFIED", per_exec: true, with_lock_wait: false },
    Ranking { title: "Top 10 statements by number of executions", column: "Executions", quantity: EXECUTIONS, per_exec: false, with_lock_wait: false },
    Ranking { title: "Top 10 statements by I/O wait time", column: "I/O wait time", quantity: "IO_WAIT_TIME", per_exec: false, with_lock_wait: false },
    Ranking { title: "Top 10 statements by I/O wait time per exec", column: "I/O wait time", quantity: "IO_WAIT_TIME", per_exec: true, with_lock_wait: false },
];

/// Highest value of one quantity and when it was collected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub value: f64,
    pub at: NaiveDateTime,
}

/// One cached statement with the peak of every tracked quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementPeak {
    pub executable_id: String,
    /// Large-object reference of the statement text.
    pub text_ref: String,
    pub peaks: BTreeMap<&'static str, Peak>,
}

impl StatementPeak {
    fn peak(&self, quantity: &str) -> Peak {
        self.peaks[quantity]
    }

    /// Value ranked by `ranking`; per-exec rankings divide peak by peak
    /// executions and keep the time of the numerator's peak.
    fn ranked(&self, ranking: &Ranking) -> Peak {
        let p = self.peak(ranking.quantity);
        if ranking.per_exec {
            Peak {
                value: p.value / self.peak(EXECUTIONS).value,
                at: p.at,
            }
        } else {
            p
        }
    }
}

/// Peak of every tracked quantity for every statement in `norm`.
pub fn statement_peaks(norm: &Normalized) -> Result<Vec<StatementPeak>> {
    let resolved = QUANTITIES
        .iter()
        .map(|&(name, fields)| {
            let idxs = fields
                .iter()
                .map(|f| norm.schema.position(f))
                .collect::<Result<Vec<_>>>()?;
            Ok((name, idxs))
        })
        .collect::<Result<Vec<_>>>()?;
    let text_idx = norm.schema.position(TEXT_FIELD)?;

    Ok(norm
        .frames
        .iter()
        .map(|frame| {
            let peaks = resolved
                .iter()
                .map(|(name, idxs)| (*name, frame_peak(norm, frame, idxs)))
                .collect();
            StatementPeak {
                executable_id: frame.context.parts().join(","),
                text_ref: last_text(frame, text_idx),
                peaks,
            }
        })
        .collect())
}

fn frame_peak(norm: &Normalized, frame: &NormalizedFrame, idxs: &[usize]) -> Peak {
    let mut best: Option<Peak> = None;
    for (row, at) in frame.rows.iter().zip(norm.axis.as_slice()) {
        let value: f64 = idxs.iter().map(|&i| row[i].as_f64()).sum();
        if best.is_none_or(|b| value > b.value) {
            best = Some(Peak { value, at: *at });
        }
    }
    // frames always hold one row per bucket and the axis is never empty
    best.unwrap_or(Peak {
        value: 0.0,
        at: NaiveDateTime::default(),
    })
}

fn last_text(frame: &NormalizedFrame, idx: usize) -> String {
    frame
        .rows
        .iter()
        .rev()
        .map(|row| match &row[idx] {
            Value::Text(s) => s.trim().to_string(),
            v => key_text(v),
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Descending, undefined values last, ties in statement order.
fn rank<'a>(statements: &'a [StatementPeak], ranking: &Ranking) -> Vec<&'a StatementPeak> {
    let key = |s: &StatementPeak| {
        let v = s.ranked(ranking).value;
        if v.is_nan() { f64::NEG_INFINITY } else { v }
    };
    let mut sorted: Vec<&StatementPeak> = statements.iter().collect();
    sorted.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    sorted.truncate(TOP_N);
    sorted
}

pub(crate) fn run<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    params: &ReportParams,
) -> Result<ReportData> {
    let opts = LoadOptions::new(params.range).keyed_by(&["EXECUTABLE_ID", "MEMBER"]);
    let set = load_group(&params.base, ReportKind::PkgCache.group(), &opts)?;
    let filter = RecordFilter::new().with("MEMBER", &params.members);
    let norm = fold_contexts(normalize(set, &filter)?, 1);
    let statements = statement_peaks(&norm)?;

    r.header_times("MONREPORT.PKGCACHE", norm.axis.as_slice())?;

    let interactive = r.options().sink.is_interactive();
    let text_width = r.options().text_width;
    let decimals = r.options().decimals;

    for ranking in RANKINGS {
        let mut headers = vec![ranking.column];
        if ranking.with_lock_wait {
            headers.push("LOCK_WAIT_TIME");
        }
        headers.extend(["PEAK TIME", "STMT_TEXT"]);
        let mut table = Table::new(&headers);

        for stmt in rank(&statements, ranking) {
            let ranked = stmt.ranked(ranking);
            let mut row = vec![format_number(ranked.value, decimals)];
            if ranking.with_lock_wait {
                row.push(format_number(stmt.peak("LOCK_WAIT_TIME").value, decimals));
            }
            row.push(display_time(&ranked.at));
            let text = r.resolve_text(&stmt.text_ref)?;
            row.push(if interactive {
                truncate(&text, text_width)
            } else {
                text
            });
            table.push(row);
        }

        r.line(ranking.title)?;
        r.separator(Separator::Dashed)?;
        r.table(&table)?;
        r.separator(Separator::Blank)?;
    }
    r.separator(Separator::Double)?;

    Ok(ReportData::Statements {
        times: norm.axis.as_slice().to_vec(),
        statements,
    })
}
