pub mod arrow;

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::source::RawTable;

/// One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Textual rendering, `None` for missing cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Date(d) => Some(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Missing => None,
        }
    }

    /// Present and not just whitespace.
    pub fn is_useful(&self) -> bool {
        match self {
            Value::Text(s) => !s.trim().is_empty(),
            Value::Missing => false,
            _ => true,
        }
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Text(_) => Some(ColumnType::Text),
            Value::Number(_) => Some(ColumnType::Number),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Missing => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => f.write_str(&s),
            None => f.write_str(""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
    Date,
}

/// Row-oriented table: `rows[i][j]` is the cell of column `columns[j]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Type every column of a raw table. A column is numeric when all its
    /// non-blank cells are finite numbers, a date column when they all parse
    /// as dates, text otherwise. Blank cells become `Missing`.
    pub fn from_raw(raw: &RawTable) -> Self {
        let width = raw.headers.len();
        let types: Vec<ColumnType> = (0..width)
            .map(|j| infer_column_type(raw.rows.iter().map(|r| r[j].as_str())))
            .collect();

        let rows = raw
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&types)
                    .map(|(cell, ty)| typed_cell(cell, *ty))
                    .collect()
            })
            .collect();

        Self {
            columns: raw.headers.clone(),
            rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Type of column `idx`, decided by its first present cell.
    /// `Err` names the first row holding a cell of a different type.
    pub fn column_type(&self, idx: usize) -> Result<Option<ColumnType>, usize> {
        let mut found = None;
        for (i, cell) in self.column(idx).enumerate() {
            match (found, cell.column_type()) {
                (_, None) => {}
                (None, Some(ty)) => found = Some(ty),
                (Some(a), Some(b)) if a != b => return Err(i),
                _ => {}
            }
        }
        Ok(found)
    }

    /// Drop spreadsheet export artifacts: columns with a placeholder name
    /// that hold fewer than `min_values` useful cells. Returns dropped names.
    pub fn prune_placeholder_columns(&mut self, min_values: usize) -> Vec<String> {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|j| {
                if !is_placeholder_name(&self.columns[j]) {
                    return true;
                }
                self.column(j).filter(|v| v.is_useful()).count() >= min_values
            })
            .collect();

        if keep.iter().all(|k| *k) {
            return Vec::new();
        }

        let dropped = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(c, _)| c.clone())
            .collect();

        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
        dropped
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| v)
        .collect()
}

/// Unnamed or auto-named column headers left behind by spreadsheet exports.
pub fn is_placeholder_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with("Unnamed:")
}

/// Trim whitespace and strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse the date shapes spreadsheet exports produce.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let present: Vec<String> = cells.map(clean_str).filter(|s| !s.is_empty()).collect();
    if present.is_empty() {
        ColumnType::Text
    } else if present.iter().all(|s| parse_number(s).is_some()) {
        ColumnType::Number
    } else if present.iter().all(|s| parse_datetime(s).is_some()) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

fn typed_cell(raw: &str, ty: ColumnType) -> Value {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return Value::Missing;
    }
    let typed = match ty {
        ColumnType::Number => parse_number(&cleaned).map(Value::Number),
        ColumnType::Date => parse_datetime(&cleaned).map(Value::Date),
        ColumnType::Text => None,
    };
    typed.unwrap_or(Value::Text(cleaned))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
