//! Outlier scoring for small sets of parallel counters.
//!
//! Monitor snapshots usually come from a handful of members or connections, so
//! the comparison baseline for any one value is computed from the *other*
//! values only (leave-one-out). Including the value itself would let a single
//! spike inflate the standard deviation it is measured against.
//!
//! Every function here is pure: callers pass a slice of `f64` and get back
//! per-value annotations or a [`SeriesSummary`].

use statrs::statistics::Statistics;

/// Default absolute z-score above which a value is reported as an outlier.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// One value of a series together with its leave-one-out score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotated {
    pub value: f64,
    /// `None` when the score is undefined (too few other values, zero spread,
    /// or a non-finite input).
    pub z: Option<f64>,
    pub outlier: bool,
}

/// Min/max/mean of a series, shown next to it when summary stats are on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Leave-one-out scoring
// ═══════════════════════════════════════════════════════════════════════════════

/// Z-score of `values[index]` against the mean and sample standard deviation
/// of every other value in the slice.
///
/// NaN entries among the other values are skipped. Returns `None` when fewer
/// than two other values remain, when their standard deviation is zero or not
/// finite, or when the value itself is not finite.
pub fn leave_one_out_z(values: &[f64], index: usize) -> Option<f64> {
    let v = *values.get(index)?;
    if !v.is_finite() {
        return None;
    }

    let others: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|&(i, x)| i != index && !x.is_nan())
        .map(|(_, &x)| x)
        .collect();
    if others.len() < 2 {
        return None;
    }

    let mean = others.iter().mean();
    let std = others.iter().std_dev();
    if !std.is_finite() || std == 0.0 || !mean.is_finite() {
        return None;
    }

    Some((v - mean) / std)
}

/// Score every value of a series and flag those with `|z| > threshold`.
pub fn annotate(values: &[f64], threshold: f64) -> Vec<Annotated> {
    (0..values.len())
        .map(|i| {
            let z = leave_one_out_z(values, i);
            Annotated {
                value: values[i],
                z,
                outlier: z.is_some_and(|z| z.abs() > threshold),
            }
        })
        .collect()
}

/// Indices of the values flagged as outliers.
pub fn outlier_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    annotate(values, threshold)
        .iter()
        .enumerate()
        .filter(|(_, a)| a.outlier)
        .map(|(i, _)| i)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Summaries
// ═══════════════════════════════════════════════════════════════════════════════

/// Min, max and mean of a series. `None` for an empty series.
///
/// Non-finite values propagate: a series containing `inf` has an infinite
/// mean, matching how undefined ratios are shown elsewhere in a report.
pub fn summarize(values: &[f64]) -> Option<SeriesSummary> {
    if values.is_empty() {
        return None;
    }
    Some(SeriesSummary {
        min: Statistics::min(values.iter()),
        max: Statistics::max(values.iter()),
        mean: values.iter().mean(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
