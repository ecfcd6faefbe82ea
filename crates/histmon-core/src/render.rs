//! Text rendering primitives shared by every report section.
//!
//! A report is a sequence of labelled rows. Each numeric row lists one value
//! per interval, scored against the other values of the same row; outliers are
//! shown in red on a terminal and marked with `*` when output is redirected.

use std::fmt::{self, Write as _};
use std::io::Write;

use chrono::NaiveDateTime;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use histmon_stats::{DEFAULT_Z_THRESHOLD, annotate, summarize};

use crate::error::Result;
use crate::lob::{BlobSource, DirBlobSource, LobResolver};
use crate::timestamp::display_time;

/// Where report text ends up. Decided once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSink {
    /// A terminal: colours allowed, long text truncated, prompts possible.
    Interactive,
    /// A file or pipe: plain text, full-length text.
    Redirected,
}

impl OutputSink {
    /// Inspect stdout.
    pub fn detect() -> Self {
        if std::io::stdout().is_tty() {
            Self::Interactive
        } else {
            Self::Redirected
        }
    }

    pub fn is_interactive(self) -> bool {
        self == Self::Interactive
    }
}

/// Layout and scoring settings for a [`Renderer`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub sink: OutputSink,
    /// Append min/max/mean after every numeric row.
    pub stats: bool,
    pub label_width: usize,
    pub value_width: usize,
    pub text_width: usize,
    pub z_threshold: f64,
    pub decimals: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sink: OutputSink::Redirected,
            stats: false,
            label_width: 40,
            value_width: 15,
            text_width: 80,
            z_threshold: DEFAULT_Z_THRESHOLD,
            decimals: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// One empty line.
    Blank,
    /// A dashed rule followed by an empty line.
    Dashed,
    /// An empty line, a double rule, an empty line.
    Double,
}

/// Left-aligned text table used for rankings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

const MIN_TABLE_COLUMN: usize = 20;

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Round to `decimals` places; undefined values print as `NaN` / `inf`.
pub fn format_number(v: f64, decimals: usize) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let scale = 10f64.powi(decimals as i32);
    let rounded = (v * scale).round() / scale;
    // avoid "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    rounded.to_string()
}

/// The value part of a numeric row: ` | 1:10 | 2:*99 | ...`.
pub fn series_cells(values: &[f64], suffix: &str, opts: &RenderOptions) -> String {
    let mut out = String::from(" |");
    for (i, a) in annotate(values, opts.z_threshold).iter().enumerate() {
        let marker = if a.outlier && !opts.sink.is_interactive() {
            '*'
        } else {
            ' '
        };
        let cell = pad(
            &format!(
                " {}:{marker}{}{suffix}",
                i + 1,
                format_number(a.value, opts.decimals)
            ),
            opts.value_width,
        );
        if a.outlier && opts.sink.is_interactive() {
            let _ = write!(out, "{}", cell.red());
        } else {
            out.push_str(&cell);
        }
    }
    out.push_str(" |");

    if opts.stats {
        if let Some(s) = summarize(values) {
            for (name, v) in [("min", s.min), ("max", s.max), ("mean", s.mean)] {
                let _ = write!(
                    out,
                    " {name}={} |",
                    pad(&format_number(v, opts.decimals), opts.value_width)
                );
            }
        }
    }
    out
}

fn pad(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}

/// Cut `s` to `width` characters, ending in `...` when shortened.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Writes report sections to `W`, resolving large-object text through `S`.
pub struct Renderer<W: Write, S: BlobSource = DirBlobSource> {
    out: W,
    opts: RenderOptions,
    lobs: LobResolver<S>,
}

impl<W: Write, S: BlobSource> Renderer<W, S> {
    pub fn new(out: W, opts: RenderOptions, lobs: LobResolver<S>) -> Self {
        Self { out, opts, lobs }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.opts
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, text: impl fmt::Display) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    pub fn separator(&mut self, sep: Separator) -> Result<()> {
        match sep {
            Separator::Blank => writeln!(self.out)?,
            Separator::Dashed => {
                writeln!(self.out, "{}", "-".repeat(self.opts.text_width))?;
                writeln!(self.out)?;
            }
            Separator::Double => {
                writeln!(self.out)?;
                writeln!(self.out, "{}", "=".repeat(self.opts.text_width))?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    /// Report title plus the listing of collection intervals.
    pub fn header(
        &mut self,
        title: &str,
        intervals: &[(NaiveDateTime, NaiveDateTime)],
        outliers: bool,
    ) -> Result<()> {
        self.separator(Separator::Double)?;
        self.line(format!("Replica of {title}"))?;
        self.separator(Separator::Blank)?;
        self.line("Collection time intervals:")?;
        for (i, (start, end)) in intervals.iter().enumerate() {
            self.line(format!(
                "  Interval {:>3}: ({}) - ({})",
                i + 1,
                display_time(start),
                display_time(end)
            ))?;
        }
        self.separator(Separator::Blank)?;
        self.line("All values shown are diffs of the values at beginning and end of the interval")?;
        if outliers {
            self.separator(Separator::Blank)?;
            self.line("Outliers are highlighted in red or preceded by an asterisk")?;
        }
        self.separator(Separator::Double)
    }

    /// Header variant for sections showing peak values rather than intervals.
    pub fn header_times(&mut self, title: &str, times: &[NaiveDateTime]) -> Result<()> {
        self.separator(Separator::Double)?;
        self.line(format!("Replica of {title}"))?;
        self.separator(Separator::Blank)?;
        self.line("Collection times:")?;
        for (i, t) in times.iter().enumerate() {
            self.line(format!("  Time {:>3}: ({})", i + 1, display_time(t)))?;
        }
        self.separator(Separator::Double)
    }

    pub fn series(&mut self, label: &str, values: &[f64]) -> Result<()> {
        self.series_with_suffix(label, values, "")
    }

    pub fn percent_series(&mut self, label: &str, values: &[f64]) -> Result<()> {
        self.series_with_suffix(label, values, "%")
    }

    fn series_with_suffix(&mut self, label: &str, values: &[f64], suffix: &str) -> Result<()> {
        let cells = series_cells(values, suffix, &self.opts);
        writeln!(
            self.out,
            "{}{cells}",
            pad(label, self.opts.label_width)
        )?;
        Ok(())
    }

    pub fn formula(&mut self, text: &str) -> Result<()> {
        writeln!(
            self.out,
            "{} {text} ",
            pad("  Formula", self.opts.label_width)
        )?;
        Ok(())
    }

    pub fn no_data(&mut self) -> Result<()> {
        self.line("  No collection data available for collection times.")?;
        self.line("  Try increasing scope by adjusting start_time, end_time, and period.")
    }

    pub fn table(&mut self, table: &Table) -> Result<()> {
        let cols = table.headers.len();
        let widths: Vec<usize> = (0..cols)
            .map(|c| {
                table
                    .rows
                    .iter()
                    .filter_map(|r| r.get(c))
                    .chain(std::iter::once(&table.headers[c]))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(MIN_TABLE_COLUMN)
            })
            .collect();

        let render_row = |cells: &[String]| {
            let mut line = String::new();
            for (c, width) in widths.iter().enumerate() {
                let cell = cells.get(c).map(String::as_str).unwrap_or("");
                if c > 0 {
                    line.push(' ');
                }
                line.push_str(&pad(cell, *width));
            }
            line.trim_end().to_string()
        };

        writeln!(self.out, "{}", render_row(&table.headers))?;
        for row in &table.rows {
            writeln!(self.out, "{}", render_row(row))?;
        }
        Ok(())
    }

    /// Resolve a large-object reference through the run's cache.
    pub fn resolve_text(&mut self, reference: &str) -> Result<String> {
        self.lobs.resolve(reference)
    }
}
