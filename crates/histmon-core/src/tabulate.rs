//! Quick tabulation of raw snapshot rows.
//!
//! No typing, normalization or differencing: rows are printed as collected,
//! sorted, right-aligned. Summary display narrows the columns to the ones the
//! collector lists for the collection.

use std::io::{self, Write};
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::loader::{collection_dirs, read_group};
use crate::snapshot::COLLECTION_TIME;
use crate::tasks::{find_task, read_task_details};
use crate::timestamp::TimeRange;

const HANDLE_FIELD: &str = "APPLICATION_HANDLE";
/// Padding added to the widest cell of each column.
const COLUMN_GAP: usize = 3;

/// Which columns to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseDisplay {
    /// `COLLECTION_TIME` plus the collection's summary columns.
    Summary,
    #[default]
    Details,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub range: TimeRange,
    pub display: ParseDisplay,
    pub application_handle: Option<String>,
}

/// Header and sorted rows ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tabulated {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Tabulated {
    /// Per column, the widest cell plus the gap.
    pub fn widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|i| {
                let widest = std::iter::once(&self.headers)
                    .chain(&self.rows)
                    .map(|row| row.get(i).map_or(0, |c| c.chars().count()))
                    .max()
                    .unwrap_or(0);
                widest + COLUMN_GAP
            })
            .collect()
    }

    /// Write the header and every row, each cell right-aligned.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let widths = self.widths();
        for row in std::iter::once(&self.headers).chain(&self.rows) {
            let line: String = row
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:>w$}"))
                .collect();
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

/// Column indices shown for `display`. Unknown summary columns are skipped
/// with a warning.
fn select_columns(
    base: &Path,
    group: &str,
    header: &[String],
    opts: &ParseOptions,
) -> Result<Vec<usize>> {
    if opts.display == ParseDisplay::Details {
        return Ok((0..header.len()).collect());
    }

    let dirs = collection_dirs(base, &opts.range)?;
    let first = dirs.first().ok_or_else(|| ReportError::NoHourlyDirectories {
        path: base.to_path_buf(),
    })?;
    let tasks = read_task_details(first)?;
    let Some(task) = find_task(&tasks, group) else {
        log::warn!("{group}: no task details entry, showing all columns");
        return Ok((0..header.len()).collect());
    };
    if !task.is_sql() {
        return Err(ReportError::UnsupportedCollection {
            group: group.to_string(),
            class: task.collection_class.clone(),
        });
    }

    let position = |name: &str| header.iter().position(|h| h == name);
    let mut columns: Vec<usize> = position(COLLECTION_TIME).into_iter().collect();
    for name in task.summary_columns() {
        match position(&name) {
            Some(idx) => columns.push(idx),
            None => log::warn!("{name} is not a valid column name; skipped"),
        }
    }
    Ok(columns)
}

/// Load the raw rows of `group` and shape them for printing.
pub fn tabulate(base: &Path, group: &str, opts: &ParseOptions) -> Result<Tabulated> {
    let raw = read_group(base, group, &opts.range)?;

    let handle_idx = match &opts.application_handle {
        Some(_) => Some(
            raw.header
                .iter()
                .position(|h| h == HANDLE_FIELD)
                .ok_or_else(|| ReportError::UnknownField(HANDLE_FIELD.to_string()))?,
        ),
        None => None,
    };
    let columns = select_columns(base, group, &raw.header, opts)?;

    let mut rows: Vec<Vec<String>> = raw
        .rows
        .iter()
        .filter(|row| match (handle_idx, &opts.application_handle) {
            (Some(idx), Some(handle)) => row.cells[idx].trim() == handle,
            _ => true,
        })
        .map(|row| columns.iter().map(|&i| row.cells[i].trim().to_string()).collect())
        .collect();
    if rows.is_empty() {
        return Err(ReportError::NoData(group.to_string()));
    }
    rows.sort();

    Ok(Tabulated {
        headers: columns.iter().map(|&i| raw.header[i].clone()).collect(),
        rows,
    })
}
