//! Delimited-text (CSV/TSV) adapter.
//!
//! Two entry points mirroring the two ways flat files get loaded:
//! [`load_homogeneous`] for files where every cell shares one declared
//! type, and [`load_mixed`] for files with per-column types.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array2;

use crate::error::{DataError, Result};
use crate::table::{Table, Value};

/// Options for delimited-text parsing
#[derive(Debug, Clone)]
pub struct DelimitedOptions {
    /// Field delimiter (default: comma)
    pub delimiter: u8,
    /// Leading rows to treat as header block (default: 0)
    pub header_rows: usize,
    /// Column indices to retain, in the requested order (default: all)
    pub columns: Option<Vec<usize>>,
    /// Cap on data rows read (default: no cap)
    pub row_limit: Option<usize>,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header_rows: 0,
            columns: None,
            row_limit: None,
        }
    }
}

impl DelimitedOptions {
    /// Options for tab-separated values
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Default::default()
        }
    }
}

/// The single declared type of a homogeneous load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Float64,
    Text,
}

/// Result of a homogeneous load: one 2-D array, all cells one type.
#[derive(Debug, Clone, PartialEq)]
pub enum HomogeneousArray {
    Numeric(Array2<f64>),
    Text(Array2<String>),
}

impl HomogeneousArray {
    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        match self {
            HomogeneousArray::Numeric(a) => a.dim(),
            HomogeneousArray::Text(a) => a.dim(),
        }
    }
}

/// Per-column typing strategy for [`load_mixed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DtypeHint {
    /// Infer one type per column (integer, then float, then boolean, then text)
    #[default]
    Infer,
    /// Force every cell to text
    Text,
}

fn raw_records(path: &Path, options: &DelimitedOptions) -> Result<Vec<Vec<String>>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false) // header handling is ours
        .flexible(true) // width is validated below, with a better error
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(records)
}

fn check_width(rows: &[Vec<String>]) -> Result<usize> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(DataError::ShapeMismatch {
                expected: width,
                found: row.len(),
                context: format!("row {i}"),
            });
        }
    }
    Ok(width)
}

fn apply_column_subset(rows: Vec<Vec<String>>, width: usize, columns: &[usize]) -> Result<Vec<Vec<String>>> {
    for &c in columns {
        if c >= width {
            return Err(DataError::ShapeMismatch {
                expected: width,
                found: c + 1,
                context: format!("column index {c} out of range"),
            });
        }
    }
    Ok(rows
        .into_iter()
        .map(|row| columns.iter().map(|&c| row[c].clone()).collect())
        .collect())
}

/// Load a delimited file where every cell must coerce to one declared type.
///
/// The first `header_rows` rows are skipped. With [`Dtype::Float64`], the
/// first cell that fails to parse aborts the load with
/// [`DataError::TypeMismatch`] — a file whose first row is a textual header
/// therefore fails loudly with `header_rows: 0` and loads cleanly with
/// `header_rows: 1`. Row and column indices in the error refer to the
/// original file.
pub fn load_homogeneous(
    path: impl AsRef<Path>,
    dtype: Dtype,
    options: &DelimitedOptions,
) -> Result<HomogeneousArray> {
    let path = path.as_ref();
    let mut rows = raw_records(path, options)?;
    let skipped = options.header_rows.min(rows.len());
    rows.drain(..skipped);
    if let Some(limit) = options.row_limit {
        rows.truncate(limit);
    }

    let width = check_width(&rows)?;
    let rows = match &options.columns {
        Some(cols) => apply_column_subset(rows, width, cols)?,
        None => rows,
    };
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let height = rows.len();

    let array = match dtype {
        Dtype::Float64 => {
            let mut data = Vec::with_capacity(height * width);
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    let parsed = cell.trim().parse::<f64>().map_err(|_| {
                        DataError::TypeMismatch {
                            row: r + skipped,
                            column: c,
                            value: cell.clone(),
                        }
                    })?;
                    data.push(parsed);
                }
            }
            HomogeneousArray::Numeric(
                Array2::from_shape_vec((height, width), data)
                    .expect("dimensions checked above"),
            )
        }
        Dtype::Text => {
            let data: Vec<String> = rows.into_iter().flatten().collect();
            HomogeneousArray::Text(
                Array2::from_shape_vec((height, width), data)
                    .expect("dimensions checked above"),
            )
        }
    };

    log::debug!(
        "loaded {}x{} homogeneous array from {}",
        height,
        width,
        path.display()
    );
    Ok(array)
}

/// Column type decided by scanning every cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColType {
    Int,
    Float,
    Bool,
    Text,
}

/// Decide a column's type. Empty cells are nulls and do not vote; a column
/// where any cell resists the current candidate falls through: integer,
/// then float, then boolean, then text.
fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColType {
    let non_empty = || cells.clone().filter(|c| !c.is_empty());
    if non_empty().all(|c| c.parse::<i64>().is_ok()) {
        return ColType::Int;
    }
    if non_empty().all(|c| c.parse::<f64>().is_ok()) {
        return ColType::Float;
    }
    if non_empty().all(|c| c == "true" || c == "false") {
        return ColType::Bool;
    }
    ColType::Text
}

fn coerce(cell: &str, col_type: ColType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match col_type {
        ColType::Int => cell.parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        ColType::Float => cell.parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        ColType::Bool => Value::Bool(cell == "true"),
        ColType::Text => Value::Text(cell.to_string()),
    }
}

/// Load a delimited file with mixed per-column types into a [`Table`].
///
/// `header_rows ≥ 1` consumes that many leading rows and takes column names
/// from the last of them; `header_rows = 0` produces positional names.
/// With [`DtypeHint::Infer`] each retained column is typed by scanning all
/// of its cells; columns that fit no uniform type stay text.
pub fn load_mixed(
    path: impl AsRef<Path>,
    dtype_hint: DtypeHint,
    options: &DelimitedOptions,
) -> Result<Table> {
    let path = path.as_ref();
    let mut rows = raw_records(path, options)?;
    let width = check_width(&rows)?;

    let names: Vec<String> = if options.header_rows == 0 {
        Table::positional_names(width)
    } else {
        let header_block: Vec<Vec<String>> =
            rows.drain(..options.header_rows.min(rows.len())).collect();
        match header_block.last() {
            Some(h) => h.clone(),
            None => Table::positional_names(width),
        }
    };

    if let Some(limit) = options.row_limit {
        rows.truncate(limit);
    }

    let (names, rows) = match &options.columns {
        Some(cols) => {
            let rows = apply_column_subset(rows, width, cols)?;
            let names = cols.iter().map(|&c| names[c].clone()).collect();
            (names, rows)
        }
        None => (names, rows),
    };
    let width = names.len();

    let data = match dtype_hint {
        DtypeHint::Text => rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            Value::Null
                        } else {
                            Value::Text(cell)
                        }
                    })
                    .collect()
            })
            .collect(),
        DtypeHint::Infer => {
            let col_types: Vec<ColType> = (0..width)
                .map(|c| infer_column_type(rows.iter().map(move |row| row[c].as_str())))
                .collect();
            rows.iter()
                .map(|row| {
                    row.iter()
                        .zip(&col_types)
                        .map(|(cell, &ty)| coerce(cell, ty))
                        .collect()
                })
                .collect()
        }
    };

    let table = Table::new(names, data)?;
    log::debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.width(),
        path.display()
    );
    Ok(table)
}
