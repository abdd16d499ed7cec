//! Spreadsheet (XLSX) adapter using calamine.

use std::path::Path;

use calamine::{open_workbook, Data, DataType, Range, Reader, Xlsx};

use crate::error::{DataError, Result};
use crate::table::{Table, Value};

/// Sheet selection: by name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

impl From<&str> for SheetSelector {
    fn from(name: &str) -> Self {
        SheetSelector::Name(name.to_string())
    }
}

impl From<String> for SheetSelector {
    fn from(name: String) -> Self {
        SheetSelector::Name(name)
    }
}

impl From<usize> for SheetSelector {
    fn from(index: usize) -> Self {
        SheetSelector::Index(index)
    }
}

/// Options for parsing one sheet
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
    /// Physical row indices (zero-based) to drop before anything else
    pub skip_rows: Vec<usize>,
    /// Column indices to retain, in the requested order (default: all)
    pub columns: Option<Vec<usize>>,
    /// Positional column names. When set, no header row is consumed and the
    /// length must match the number of retained columns.
    pub rename: Option<Vec<String>>,
    /// Cap on data rows
    pub row_limit: Option<usize>,
}

/// List sheet names in workbook order.
pub fn list_sheets(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let workbook: Xlsx<_> = open_workbook(path.as_ref())?;
    Ok(workbook.sheet_names().to_vec())
}

fn sheet_range(path: &Path, selector: &SheetSelector) -> Result<Range<Data>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    match selector {
        SheetSelector::Name(name) => workbook
            .worksheet_range(name)
            .map_err(|e| DataError::SheetNotFound(format!("{name}: {e}"))),
        SheetSelector::Index(index) => workbook
            .worksheet_range_at(*index)
            .ok_or_else(|| DataError::SheetNotFound(format!("index {index} out of range")))?
            .map_err(DataError::from),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Float(*f),
        Data::Int(i) => Value::Int(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => {
            log::debug!("error cell treated as null: {e:?}");
            Value::Null
        }
    }
}

fn header_name(cell: &Data, index: usize) -> String {
    match cell.as_string() {
        Some(s) if !s.is_empty() => s,
        _ => index.to_string(),
    }
}

/// Load one sheet into a [`Table`].
///
/// `skip_rows` drops physical rows first. If `rename` is given it names the
/// retained columns positionally and every remaining row is data; otherwise
/// the first remaining row becomes the header.
pub fn load_sheet(
    path: impl AsRef<Path>,
    selector: impl Into<SheetSelector>,
    options: &SheetOptions,
) -> Result<Table> {
    let path = path.as_ref();
    let selector = selector.into();
    let range = sheet_range(path, &selector)?;
    let width = range.width();

    let mut rows: Vec<&[Data]> = range
        .rows()
        .enumerate()
        .filter(|(i, _)| !options.skip_rows.contains(i))
        .map(|(_, row)| row)
        .collect();

    let retained: Vec<usize> = match &options.columns {
        Some(cols) => {
            for &c in cols {
                if c >= width {
                    return Err(DataError::ShapeMismatch {
                        expected: width,
                        found: c + 1,
                        context: format!("column index {c} out of range"),
                    });
                }
            }
            cols.clone()
        }
        None => (0..width).collect(),
    };

    let names: Vec<String> = match &options.rename {
        Some(names) => {
            if names.len() != retained.len() {
                return Err(DataError::ShapeMismatch {
                    expected: retained.len(),
                    found: names.len(),
                    context: "rename list".to_string(),
                });
            }
            names.clone()
        }
        None => {
            if rows.is_empty() {
                retained.iter().map(|c| c.to_string()).collect()
            } else {
                let header = rows.remove(0);
                retained
                    .iter()
                    .map(|&c| header_name(&header[c], c))
                    .collect()
            }
        }
    };

    if let Some(limit) = options.row_limit {
        rows.truncate(limit);
    }

    let data: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| retained.iter().map(|&c| cell_to_value(&row[c])).collect())
        .collect();

    let table = Table::new(names, data)?;
    log::debug!(
        "loaded sheet {selector:?} from {}: {} rows x {} columns",
        path.display(),
        table.len(),
        table.width()
    );
    Ok(table)
}
