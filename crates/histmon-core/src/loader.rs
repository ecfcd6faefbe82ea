//! Source loader: discovers the snapshot files of one counter-group and parses
//! them into a [`SnapshotSet`].
//!
//! # Layout
//!
//! ```text
//! <base>/
//!   SAMPLE_2024030110/                  hourly directory (<prefix>_YYYYMMDDHH)
//!     MON_GET_DATABASE_202403011015.del
//!     MON_GET_DATABASE_202403011030.del
//!     lob/                              large-object blobs
//!   SAMPLE_2024030111/
//!     ...
//! ```
//!
//! Each `.del` file is comma-delimited with a header line. Files may contain
//! NUL bytes and stray non-UTF-8 bytes; both are tolerated.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};

use crate::error::{ReportError, Result};
use crate::snapshot::{
    COLLECTION_TIME, ContextKey, FieldKind, Schema, SnapshotRecord, SnapshotSet, Value,
    split_fields, split_records,
};
use crate::timestamp::{TimeRange, file_minute_stamp, hourly_dir_stamp, parse_collection_time};

/// What to load and how to key it.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Records outside this range are dropped; whole hourly directories and
    /// minute files outside it are never opened.
    pub range: TimeRange,
    /// Columns forming the context key. Empty folds every row into one context.
    pub key_fields: Vec<String>,
}

impl LoadOptions {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            key_fields: Vec::new(),
        }
    }

    pub fn keyed_by(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Rows of one counter-group as untyped cells, in file order.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub group: String,
    pub header: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone)]
pub struct RawRow {
    pub collected_at: NaiveDateTime,
    pub cells: Vec<String>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode bytes as UTF-8, dropping invalid sequences and replacing NUL with `.`.
pub fn decode_permissive(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    if out.contains('\0') {
        out = out.replace('\0', ".");
    }
    out
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Immediate subdirectories of `base` worth scanning for `range`, sorted.
///
/// Hourly directories whose hour lies wholly outside the range are skipped;
/// directories without an hour stamp are always kept.
pub fn collection_dirs(base: &Path, range: &TimeRange) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(base).map_err(|e| ReportError::file(base, e))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(hour) = hourly_dir_stamp(&name) {
            if !range.overlaps(hour, Duration::hours(1)) {
                log::debug!("skipping {name}: outside requested time range");
                continue;
            }
        }
        dirs.push(entry.path());
    }
    dirs.sort();

    if dirs.is_empty() && !range.is_unbounded() {
        return Err(ReportError::NoHourlyDirectories {
            path: base.to_path_buf(),
        });
    }
    Ok(dirs)
}

/// Every `<group>_*.del` file directly under one of `dirs`, sorted by path.
/// Files whose minute stamp lies outside `range` are left out.
fn group_files(dirs: &[PathBuf], group: &str, range: &TimeRange) -> Result<Vec<PathBuf>> {
    let prefix = format!("{group}_");
    let mut matched = 0usize;
    let mut files = Vec::new();

    for dir in dirs {
        let entries = fs::read_dir(dir).map_err(|e| ReportError::file(dir, e))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || !name.ends_with(".del") {
                continue;
            }
            if !entry.file_type()?.is_file() {
                continue;
            }
            matched += 1;
            if let Some(minute) = file_minute_stamp(&name) {
                if !range.overlaps(minute, Duration::minutes(1)) {
                    continue;
                }
            }
            files.push(entry.path());
        }
    }

    if matched == 0 {
        return Err(ReportError::CollectionNotFound(group.to_string()));
    }
    files.sort();
    log::debug!(
        "{group}: {} of {matched} files in range",
        files.len()
    );
    Ok(files)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read every file of `group` under `base` into untyped rows.
///
/// All files must share one header. Rows whose field count differs from the
/// header, or whose `COLLECTION_TIME` does not parse, are skipped with a
/// warning. Rows outside `range` are dropped.
pub fn read_group(base: &Path, group: &str, range: &TimeRange) -> Result<RawTable> {
    let dirs = collection_dirs(base, range)?;
    let files = group_files(&dirs, group, range)?;

    let mut header_line: Option<String> = None;
    let mut header = Vec::new();
    let mut time_idx = 0usize;
    let mut rows = Vec::new();

    for path in &files {
        let bytes = fs::read(path).map_err(|e| ReportError::file(path, e))?;
        let text = decode_permissive(&bytes);
        let mut records = split_records(&text).into_iter();

        let Some(first) = records.next() else {
            log::warn!("{}: empty file", path.display());
            continue;
        };
        let first = first.trim();
        match &header_line {
            Some(h) if h != first => {
                return Err(ReportError::SchemaMismatch {
                    group: group.to_string(),
                    path: path.clone(),
                });
            }
            Some(_) => {}
            None => {
                header = split_fields(first)
                    .into_iter()
                    .map(|h| h.trim().to_string())
                    .collect();
                time_idx = header
                    .iter()
                    .position(|h| h == COLLECTION_TIME)
                    .ok_or_else(|| ReportError::UnknownField(COLLECTION_TIME.to_string()))?;
                header_line = Some(first.to_string());
            }
        }

        for (n, record) in records.enumerate() {
            if record.trim().is_empty() {
                continue;
            }
            let cells = split_fields(record);
            if cells.len() != header.len() {
                log::warn!(
                    "{} record {}: expected {} fields, found {}; row skipped",
                    path.display(),
                    n + 1,
                    header.len(),
                    cells.len()
                );
                continue;
            }
            let collected_at = match parse_collection_time(&cells[time_idx]) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("{} record {}: {e}; row skipped", path.display(), n + 1);
                    continue;
                }
            };
            if !range.contains(&collected_at) {
                continue;
            }
            rows.push(RawRow {
                collected_at,
                cells,
            });
        }
    }

    if header_line.is_none() {
        return Err(ReportError::NoData(group.to_string()));
    }

    Ok(RawTable {
        group: group.to_string(),
        header,
        rows,
    })
}

/// Load `group` under `base` as typed records keyed by `opts.key_fields`.
///
/// A column is numeric when every non-empty cell in the group parses as a
/// number; empty numeric cells read as `0`.
pub fn load_group(base: &Path, group: &str, opts: &LoadOptions) -> Result<SnapshotSet> {
    let raw = read_group(base, group, &opts.range)?;
    let mut set = type_table(raw);
    let keys: Vec<&str> = opts.key_fields.iter().map(String::as_str).collect();
    set.rekey(&keys)?;
    log::debug!(
        "{group}: loaded {} records, {} columns",
        set.records.len(),
        set.schema.len()
    );
    Ok(set)
}

fn type_table(raw: RawTable) -> SnapshotSet {
    let mut schema = Schema::from_names(&raw.header);

    for idx in 0..schema.len() {
        let numeric = raw.rows.iter().all(|row| {
            let cell = row.cells[idx].trim();
            cell.is_empty() || cell.parse::<f64>().is_ok()
        });
        if !numeric {
            schema.set_kind(idx, FieldKind::Text);
        }
    }
    if let Some(idx) = schema.get(COLLECTION_TIME) {
        schema.set_kind(idx, FieldKind::Text);
    }

    let records = raw
        .rows
        .into_iter()
        .map(|row| {
            let values = row
                .cells
                .into_iter()
                .enumerate()
                .map(|(idx, cell)| match schema.kind(idx) {
                    FieldKind::Numeric => Value::Number(cell.trim().parse().unwrap_or(0.0)),
                    FieldKind::Text => Value::Text(cell),
                })
                .collect();
            SnapshotRecord {
                context: ContextKey::default(),
                collected_at: row.collected_at,
                values,
            }
        })
        .collect();

    SnapshotSet {
        group: raw.group,
        schema,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "COLLECTION_TIME,MEMBER,APPLICATION_NAME,ROWS_READ";

    fn write(dir: &Path, rel: &str, bytes: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_replaces_nul_and_drops_invalid() {
        assert_eq!(decode_permissive(b"a\x00b\xffc"), "a.bc");
        assert_eq!(decode_permissive("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn test_load_two_files_typed_and_keyed() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "S_2024030110/MON_GET_DATABASE_202403011000.del",
            format!("{HEADER}\n2024-03-01-10.00.00.000001,0,\"db2, sys\",10\n").as_bytes(),
        );
        write(
            tmp.path(),
            "S_2024030110/MON_GET_DATABASE_202403011001.del",
            format!("{HEADER}\r\n2024-03-01-10.01.00.000000,1,app,25\r\n\r\n").as_bytes(),
        );

        let opts = LoadOptions::default().keyed_by(&["MEMBER"]);
        let set = load_group(tmp.path(), "MON_GET_DATABASE", &opts).unwrap();
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.schema.kind(1), FieldKind::Numeric);
        assert_eq!(set.schema.kind(2), FieldKind::Text);
        assert_eq!(set.records[0].context, ContextKey(vec!["0".into()]));
        assert_eq!(set.records[0].values[2], Value::Text("db2, sys".into()));
        assert_eq!(set.records[1].values[3], Value::Number(25.0));
        assert_eq!(set.records[0].collected_at, at("2024-03-01 10:00:00"));
    }

    #[test]
    fn test_nul_bytes_and_invalid_utf8_in_file() {
        let tmp = TempDir::new().unwrap();
        let mut body = format!("{HEADER}\n").into_bytes();
        body.extend_from_slice(b"2024-03-01-10.00.00.000000,0,a\x00b\xfe,7\n");
        write(tmp.path(), "d/MON_GET_DATABASE_1.del", &body);

        let set = load_group(tmp.path(), "MON_GET_DATABASE", &LoadOptions::default()).unwrap();
        assert_eq!(set.records[0].values[2], Value::Text("a.b".into()));
    }

    #[test]
    fn test_quoted_text_spanning_lines_stays_one_row() {
        let tmp = TempDir::new().unwrap();
        let body = "COLLECTION_TIME,MEMBER,STMT_TEXT,NUM_EXECUTIONS\r\n\
                    2024-03-01-10.00.00.000000,0,\"SELECT *\r\n  FROM staff\n WHERE id = 1\",4\r\n\
                    2024-03-01-10.00.00.000000,1,\"VALUES 1\",2\r\n";
        write(
            tmp.path(),
            "S_2024030110/MON_GET_PKG_CACHE_STMT_202403011000.del",
            body.as_bytes(),
        );

        let set =
            load_group(tmp.path(), "MON_GET_PKG_CACHE_STMT", &LoadOptions::default()).unwrap();
        assert_eq!(set.records.len(), 2);
        assert_eq!(
            set.records[0].values[2],
            Value::Text("SELECT *\r\n  FROM staff\n WHERE id = 1".into())
        );
        assert_eq!(set.records[0].values[3], Value::Number(4.0));
        assert_eq!(set.records[1].values[2], Value::Text("VALUES 1".into()));
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "d/MON_GET_DATABASE_1.del",
            format!(
                "{HEADER}\n2024-03-01-10.00.00.000000,0,a\nnot-a-time,0,a,1\n2024-03-01-10.00.00.000000,0,a,3\n"
            )
            .as_bytes(),
        );
        let raw = read_group(tmp.path(), "MON_GET_DATABASE", &TimeRange::default()).unwrap();
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0].cells[3], "3");
    }

    #[test]
    fn test_missing_collection() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "d/MON_GET_CONNECTION_1.del", HEADER.as_bytes());
        let err = load_group(tmp.path(), "MON_GET_DATABASE", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::CollectionNotFound(g) if g == "MON_GET_DATABASE"));
    }

    #[test]
    fn test_header_mismatch() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "d/MON_GET_DATABASE_1.del", HEADER.as_bytes());
        write(
            tmp.path(),
            "d/MON_GET_DATABASE_2.del",
            b"COLLECTION_TIME,MEMBER,ROWS_READ",
        );
        let err = load_group(tmp.path(), "MON_GET_DATABASE", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_unknown_key_field() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "d/MON_GET_DATABASE_1.del",
            format!("{HEADER}\n2024-03-01-10.00.00.000000,0,a,1\n").as_bytes(),
        );
        let opts = LoadOptions::default().keyed_by(&["APPLICATION_HANDLE"]);
        let err = load_group(tmp.path(), "MON_GET_DATABASE", &opts).unwrap_err();
        assert!(matches!(err, ReportError::UnknownField(f) if f == "APPLICATION_HANDLE"));
    }

    // -----------------------------------------------------------------------
    // Time pruning
    // -----------------------------------------------------------------------

    #[test]
    fn test_time_pruning_of_dirs_files_and_rows() {
        let tmp = TempDir::new().unwrap();
        let row = |t: &str, v: u32| format!("{HEADER}\n{t},0,a,{v}\n");
        write(
            tmp.path(),
            "S_2024030109/MON_GET_DATABASE_202403010959.del",
            row("2024-03-01-09.59.00.000000", 1).as_bytes(),
        );
        write(
            tmp.path(),
            "S_2024030110/MON_GET_DATABASE_202403011000.del",
            row("2024-03-01-10.00.00.000000", 2).as_bytes(),
        );
        write(
            tmp.path(),
            "S_2024030110/MON_GET_DATABASE_202403011030.del",
            row("2024-03-01-10.30.00.000000", 3).as_bytes(),
        );

        let range = TimeRange::parse(Some("2024-03-01 10:00:00"), Some("2024-03-01 10:15:00")).unwrap();
        let raw = read_group(tmp.path(), "MON_GET_DATABASE", &range).unwrap();
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0].cells[3], "2");
    }

    #[test]
    fn test_no_hourly_directory_in_range() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "S_2024030110/MON_GET_DATABASE_1.del", HEADER.as_bytes());
        let range = TimeRange::parse(Some("2025-01-01"), None).unwrap();
        let err = read_group(tmp.path(), "MON_GET_DATABASE", &range).unwrap_err();
        assert!(matches!(err, ReportError::NoHourlyDirectories { .. }));
        assert!(err.is_input_missing());
    }
}
