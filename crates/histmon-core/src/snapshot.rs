//! Snapshot data model: schema, values, context keys and parsed records.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{ReportError, Result};

/// Column holding the collection timestamp in every counter-group.
pub const COLLECTION_TIME: &str = "COLLECTION_TIME";

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One cell of a snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell; text cells read as `0.0`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(_) => 0.0,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    /// The zero cell used for leading gaps of a normalized frame.
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Numeric => Value::Number(0.0),
            FieldKind::Text => Value::Text(String::new()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Whether a column is differenced (numeric) or carried through (text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Text,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered column list of one counter-group, built from a file header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    fields: Vec<Field>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from a header line. Every column starts out numeric;
    /// the loader demotes columns holding non-numeric cells to text.
    pub fn from_header(header: &str) -> Self {
        let names: Vec<String> = split_fields(header)
            .into_iter()
            .map(|n| n.trim().to_string())
            .collect();
        Self::from_names(&names)
    }

    /// All-numeric schema over already split column names.
    pub fn from_names(names: &[String]) -> Self {
        Self::from_fields(
            names
                .iter()
                .map(|name| Field {
                    name: name.clone(),
                    kind: FieldKind::Numeric,
                })
                .collect(),
        )
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self { fields, index }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Position of a column, or `None` if the group has no such column.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of a column; unknown names fail fast with the column name.
    pub fn position(&self, name: &str) -> Result<usize> {
        self.get(name)
            .ok_or_else(|| ReportError::UnknownField(name.to_string()))
    }

    pub fn kind(&self, idx: usize) -> FieldKind {
        self.fields[idx].kind
    }

    pub(crate) fn set_kind(&mut self, idx: usize, kind: FieldKind) {
        self.fields[idx].kind = kind;
    }

    /// Append a numeric column (used for counters a group does not collect).
    pub fn push_numeric(&mut self, name: &str) -> usize {
        if let Some(idx) = self.get(name) {
            return idx;
        }
        self.fields.push(Field {
            name: name.to_string(),
            kind: FieldKind::Numeric,
        });
        let idx = self.fields.len() - 1;
        self.index.insert(name.to_string(), idx);
        idx
    }
}

/// Split one delimited line into fields.
///
/// Fields may be wrapped in double quotes; inside quotes a comma does not
/// split and `""` stands for a literal quote.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

/// Split file contents into records, one per line.
///
/// A line break inside double quotes belongs to the field, so a statement
/// text spanning several lines stays one record. A trailing `\r` is dropped.
pub fn split_records(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                out.push(text[start..i].trim_end_matches('\r'));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        out.push(text[start..].trim_end_matches('\r'));
    }
    out
}

// ---------------------------------------------------------------------------
// Context keys and records
// ---------------------------------------------------------------------------

/// Identity of one parallel snapshot source (member, connection, statement).
///
/// The empty key stands for the whole database: every row folds into it.
/// Keys order part by part, numerically where both parts are numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ContextKey(pub Vec<String>);

fn compare_part(a: &str, b: &str) -> Ordering {
    let number = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

impl Ord for ContextKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| compare_part(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

impl PartialOrd for ContextKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ContextKey {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(all)");
        }
        f.write_str(&self.0.join(", "))
    }
}

/// One parsed snapshot row.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub context: ContextKey,
    pub collected_at: NaiveDateTime,
    /// Cells in schema order.
    pub values: Vec<Value>,
}

/// Every record of one counter-group, in file order.
#[derive(Debug, Clone)]
pub struct SnapshotSet {
    pub group: String,
    pub schema: Schema,
    pub records: Vec<SnapshotRecord>,
}

impl SnapshotSet {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a zero-valued numeric column to every record.
    pub fn add_zero_column(&mut self, name: &str) {
        let before = self.schema.len();
        let idx = self.schema.push_numeric(name);
        if idx == before {
            for rec in &mut self.records {
                rec.values.push(Value::Number(0.0));
            }
        }
    }

    /// Keep only the records accepted by `filter`.
    pub fn retain(&mut self, filter: &RecordFilter) -> Result<()> {
        let checks = filter.resolve(&self.schema)?;
        self.records.retain(|rec| {
            checks
                .iter()
                .all(|(idx, allowed)| allowed.iter().any(|a| cell_matches(&rec.values[*idx], a)))
        });
        Ok(())
    }

    /// Re-key every record by the given columns.
    pub fn rekey(&mut self, key_fields: &[&str]) -> Result<()> {
        let idxs = key_fields
            .iter()
            .map(|name| self.schema.position(name))
            .collect::<Result<Vec<_>>>()?;
        for rec in &mut self.records {
            rec.context = ContextKey(idxs.iter().map(|&i| key_text(&rec.values[i])).collect());
        }
        Ok(())
    }
}

/// Restriction of records to a subset of context attribute values,
/// e.g. `MEMBER in {0, 2}`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    conditions: Vec<(String, Vec<String>)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to hold one of `allowed`. An empty list is ignored.
    pub fn with(mut self, field: &str, allowed: &[String]) -> Self {
        if !allowed.is_empty() {
            self.conditions.push((field.to_string(), allowed.to_vec()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn resolve<'a>(&'a self, schema: &Schema) -> Result<Vec<(usize, &'a [String])>> {
        self.conditions
            .iter()
            .map(|(field, allowed)| Ok((schema.position(field)?, allowed.as_slice())))
            .collect()
    }
}

/// Text form of a cell used in context keys: integral numbers lose the `.0`.
pub fn key_text(value: &Value) -> String {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
        Value::Number(n) => n.to_string(),
        Value::Text(s) => s.trim().to_string(),
    }
}

fn cell_matches(value: &Value, wanted: &str) -> bool {
    let wanted = wanted.trim();
    match value {
        Value::Number(n) => wanted.parse::<f64>().is_ok_and(|w| w == *n),
        Value::Text(s) => s.trim() == wanted,
    }
}
