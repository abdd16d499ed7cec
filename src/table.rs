use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of a tabular result
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Infer a value from raw text. The order is fixed: empty → `Null`,
    /// then integer, then float, then boolean literal, then text.
    pub fn infer(raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        if raw == "true" || raw == "false" {
            return Value::Bool(raw == "true");
        }
        Value::Text(raw.to_string())
    }

    /// Interpret the value as an `f64` where that makes sense.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value for the CSV writer. Unlike `Display`, floats keep
    /// full precision and a decimal point so a reload infers them as floats
    /// again; nulls become empty fields.
    fn to_csv_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    format!("{v:.1}")
                } else {
                    v.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – ordered rows under named columns
// ---------------------------------------------------------------------------

/// An in-memory table: named columns in source order, rows of [`Value`]s.
///
/// Invariant: every row has exactly `columns.len()` cells. Constructors
/// enforce this, so accessors can index without bounds anxiety.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, validating that all rows match the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let width = columns.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(DataError::ShapeMismatch {
                    expected: width,
                    found: row.len(),
                    context: format!("row {i}"),
                });
            }
        }
        Ok(Table { columns, rows })
    }

    /// An empty table with the given column names.
    pub fn empty(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Unchecked construction for callers that build rows against a known
    /// column set (the row width invariant must already hold).
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Table { columns, rows }
    }

    /// Positional column names `"0"`, `"1"`, … for headerless sources.
    pub fn positional_names(width: usize) -> Vec<String> {
        (0..width).map(|i| i.to_string()).collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell lookup by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Project onto a subset of columns, preserving the requested order.
    pub fn select_by_indices(&self, indices: &[usize]) -> Result<Table> {
        for &i in indices {
            if i >= self.width() {
                return Err(DataError::ShapeMismatch {
                    expected: self.width(),
                    found: i + 1,
                    context: format!("column index {i} out of range"),
                });
            }
        }
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Table { columns, rows })
    }

    /// Project onto a subset of columns by name.
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n).ok_or_else(|| DataError::ShapeMismatch {
                    expected: self.width(),
                    found: 0,
                    context: format!("no column named {n:?}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.select_by_indices(&indices)
    }

    /// The first `n` rows (or fewer).
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Drop all rows past `limit` in place.
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Write the table as CSV: header row, then data rows. Nulls become
    /// empty fields; whole floats keep a trailing `.0` so a reload infers
    /// the column as float again.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(&self.columns)?;
        for row in &self.rows {
            w.write_record(row.iter().map(|v| v.to_csv_field()))?;
        }
        w.flush()?;
        Ok(())
    }

    /// Write the table as a CSV file at `path`.
    pub fn to_csv_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}
