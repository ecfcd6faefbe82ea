//! Time axis normalizer.
//!
//! Contexts are sampled independently: a member may miss a cycle, a connection
//! may appear halfway through the window. Normalizing puts every context on
//! the same sorted axis of observed timestamps so that row `i` of any frame
//! refers to the same instant.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use crate::error::{ReportError, Result};
use crate::snapshot::{ContextKey, RecordFilter, Schema, SnapshotSet, Value};

/// Strictly increasing distinct collection timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeAxis(Vec<NaiveDateTime>);

impl TimeAxis {
    /// Build an axis from arbitrary timestamps (sorted and deduplicated).
    pub fn from_times(times: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        let set: BTreeSet<NaiveDateTime> = times.into_iter().collect();
        Self(set.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<NaiveDateTime> {
        self.0.get(i).copied()
    }

    pub fn as_slice(&self) -> &[NaiveDateTime] {
        &self.0
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.0.last().copied()
    }
}

/// One context reindexed onto the axis: exactly one row per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    pub context: ContextKey,
    /// Row `i` belongs to `axis[i]`; cells in schema order.
    pub rows: Vec<Vec<Value>>,
}

/// Every context of a counter-group on a shared axis.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub group: String,
    pub schema: Schema,
    pub axis: TimeAxis,
    /// Sorted by context key.
    pub frames: Vec<NormalizedFrame>,
}

impl Normalized {
    pub fn frame(&self, context: &ContextKey) -> Option<&NormalizedFrame> {
        self.frames.iter().find(|f| &f.context == context)
    }
}

/// Filter `set`, then reindex each context onto the global axis.
///
/// Records sharing a context and timestamp are summed field-wise (text keeps
/// the last non-empty value). Buckets before a context's first sample become
/// zero rows; later gaps repeat the previous row. Fails with `NoData` when
/// nothing survives the filter.
pub fn normalize(mut set: SnapshotSet, filter: &RecordFilter) -> Result<Normalized> {
    if !filter.is_empty() {
        set.retain(filter)?;
    }
    if set.is_empty() {
        return Err(ReportError::NoData(set.group));
    }

    let schema = set.schema;
    let axis = TimeAxis::from_times(set.records.iter().map(|r| r.collected_at));

    let mut samples: BTreeMap<ContextKey, BTreeMap<NaiveDateTime, Vec<Value>>> = BTreeMap::new();
    for rec in set.records {
        let by_time = samples.entry(rec.context).or_default();
        match by_time.get_mut(&rec.collected_at) {
            Some(existing) => merge_into(existing, rec.values),
            None => {
                by_time.insert(rec.collected_at, rec.values);
            }
        }
    }

    let zero_row: Vec<Value> = schema.fields().iter().map(|f| Value::zero(f.kind)).collect();

    let frames = samples
        .into_iter()
        .map(|(context, mut by_time)| {
            let mut rows = Vec::with_capacity(axis.len());
            let mut last: Option<Vec<Value>> = None;
            for t in axis.as_slice() {
                if let Some(row) = by_time.remove(t) {
                    last = Some(row);
                }
                rows.push(last.clone().unwrap_or_else(|| zero_row.clone()));
            }
            NormalizedFrame { context, rows }
        })
        .collect();

    log::debug!("{}: {} buckets", set.group, axis.len());
    Ok(Normalized {
        group: set.group,
        schema,
        axis,
        frames,
    })
}

/// Sum frames whose keys share their first `keep` parts, bucket by bucket.
///
/// Used to collapse per-member frames into one database-wide frame after each
/// member was forward-filled on its own. Text cells keep the last non-empty
/// value. Frames stay sorted by the shortened key.
pub fn fold_contexts(norm: Normalized, keep: usize) -> Normalized {
    let mut folded: BTreeMap<ContextKey, Vec<Vec<Value>>> = BTreeMap::new();
    for frame in norm.frames {
        let parts = frame.context.0;
        let key = ContextKey(parts.into_iter().take(keep).collect());
        match folded.get_mut(&key) {
            Some(rows) => {
                for (row, incoming) in rows.iter_mut().zip(frame.rows) {
                    merge_into(row, incoming);
                }
            }
            None => {
                folded.insert(key, frame.rows);
            }
        }
    }

    Normalized {
        frames: folded
            .into_iter()
            .map(|(context, rows)| NormalizedFrame { context, rows })
            .collect(),
        ..norm
    }
}

fn merge_into(existing: &mut [Value], incoming: Vec<Value>) {
    for (cell, new) in existing.iter_mut().zip(incoming) {
        match (cell, new) {
            (Value::Number(a), Value::Number(b)) => *a += b,
            (_, Value::Text(t)) if t.is_empty() => {}
            (cell, new) => *cell = new,
        }
    }
}
