//! Interval differencer: turns cumulative counters into per-interval deltas.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{ReportError, Result};
use crate::normalize::{Normalized, TimeAxis};
use crate::snapshot::{ContextKey, FieldKind, Schema, Value};

/// Deltas of one context over `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferencedRecord {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub elapsed_secs: f64,
    /// Numeric cells are `row[end] - row[start]`; text cells come from `end`.
    pub values: Vec<Value>,
}

impl DifferencedRecord {
    pub fn num(&self, idx: usize) -> f64 {
        self.values[idx].as_f64()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DifferencedFrame {
    pub context: ContextKey,
    pub records: Vec<DifferencedRecord>,
}

impl DifferencedFrame {
    /// Values of column `idx` across every interval.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.records.iter().map(|r| r.num(idx)).collect()
    }

    pub fn elapsed(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.elapsed_secs).collect()
    }
}

/// Every context of a counter-group, differenced over the same intervals.
#[derive(Debug, Clone, Serialize)]
pub struct Differenced {
    pub group: String,
    pub period: usize,
    pub schema: Schema,
    /// `(start, end)` of every interval, shared by all frames.
    pub intervals: Vec<(NaiveDateTime, NaiveDateTime)>,
    pub frames: Vec<DifferencedFrame>,
}

impl Differenced {
    pub fn position(&self, name: &str) -> Result<usize> {
        self.schema.position(name)
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Difference every frame of `norm` over `period` buckets.
///
/// Row `i` of the result compares bucket `i + period` with bucket `i`, so the
/// output holds `axis.len() - period` intervals (none when the axis is too
/// short). `period == 0` is rejected.
pub fn difference(norm: &Normalized, period: usize) -> Result<Differenced> {
    if period == 0 {
        return Err(ReportError::InvalidPeriod(period));
    }
    let intervals = intervals(&norm.axis, period);
    let kinds: Vec<FieldKind> = norm.schema.fields().iter().map(|f| f.kind).collect();

    let frames = norm
        .frames
        .iter()
        .map(|frame| {
            let records = intervals
                .iter()
                .enumerate()
                .map(|(i, &(start, end))| {
                    let before = &frame.rows[i];
                    let after = &frame.rows[i + period];
                    DifferencedRecord {
                        start,
                        end,
                        elapsed_secs: (end - start).num_milliseconds() as f64 / 1000.0,
                        values: delta_row(&kinds, before, after),
                    }
                })
                .collect();
            DifferencedFrame {
                context: frame.context.clone(),
                records,
            }
        })
        .collect();

    Ok(Differenced {
        group: norm.group.clone(),
        period,
        schema: norm.schema.clone(),
        intervals,
        frames,
    })
}

/// `(t[i - period], t[i])` for every `i >= period`.
pub fn intervals(axis: &TimeAxis, period: usize) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let t = axis.as_slice();
    (period..t.len()).map(|i| (t[i - period], t[i])).collect()
}

fn delta_row(kinds: &[FieldKind], before: &[Value], after: &[Value]) -> Vec<Value> {
    kinds
        .iter()
        .zip(before.iter().zip(after))
        .map(|(kind, (b, a))| match kind {
            FieldKind::Numeric => Value::Number(a.as_f64() - b.as_f64()),
            FieldKind::Text => a.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizedFrame;

    fn at(min: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, min, 0)
            .unwrap()
    }

    fn normalized(series: &[f64]) -> Normalized {
        let mut schema = Schema::from_header("NAME,ROWS_READ");
        schema.set_kind(0, FieldKind::Text);
        Normalized {
            group: "G".into(),
            schema,
            axis: TimeAxis::from_times((0..series.len() as u32).map(at)),
            frames: vec![NormalizedFrame {
                context: ContextKey::default(),
                rows: series
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| vec![Value::Text(format!("r{i}")), Value::Number(v)])
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_constant_series_gives_zero_deltas() {
        let n = normalized(&[7.0; 5]);
        for p in 1..=4 {
            let d = difference(&n, p).unwrap();
            assert_eq!(d.intervals.len(), 5 - p);
            assert!(d.frames[0].column(1).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_period_two() {
        let n = normalized(&[0.0, 10.0, 30.0, 60.0]);
        let d = difference(&n, 2).unwrap();
        assert_eq!(d.frames[0].column(1), vec![30.0, 50.0]);
        assert_eq!(d.intervals[0], (at(0), at(2)));
        assert_eq!(d.frames[0].records[0].elapsed_secs, 120.0);
        assert_eq!(d.frames[0].records[1].values[0], Value::Text("r3".into()));
    }

    #[test]
    fn test_period_longer_than_axis_is_empty() {
        let n = normalized(&[1.0, 2.0]);
        let d = difference(&n, 3).unwrap();
        assert!(d.is_empty());
        assert!(d.frames[0].records.is_empty());
    }

    #[test]
    fn test_zero_period_rejected() {
        let n = normalized(&[1.0, 2.0]);
        assert!(matches!(difference(&n, 0), Err(ReportError::InvalidPeriod(0))));
    }
}
