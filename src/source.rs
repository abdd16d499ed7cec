//! Source descriptors and the format dispatcher.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::formats::delimited::{self, DelimitedOptions, DtypeHint};
use crate::formats::spreadsheet::{self, SheetOptions, SheetSelector};
use crate::formats::{matrix, sql, statpkg};
use crate::table::Table;

// ---------------------------------------------------------------------------
// SourceFormat – the dispatch tag
// ---------------------------------------------------------------------------

/// The recognized source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    DelimitedText,
    Spreadsheet,
    StatisticalPackage,
    HierarchicalBinary,
    MatrixBinary,
    RelationalQuery,
}

impl SourceFormat {
    /// Map a format tag to an adapter. Pure selection, no side effects;
    /// unrecognized tags fail with [`DataError::UnsupportedFormat`].
    pub fn parse_tag(tag: &str) -> Result<SourceFormat> {
        match tag {
            "delimited-text" => Ok(SourceFormat::DelimitedText),
            "spreadsheet" => Ok(SourceFormat::Spreadsheet),
            "statistical-package" => Ok(SourceFormat::StatisticalPackage),
            "hierarchical-binary" => Ok(SourceFormat::HierarchicalBinary),
            "matrix-binary" => Ok(SourceFormat::MatrixBinary),
            "relational-query" => Ok(SourceFormat::RelationalQuery),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Classify by file extension.
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(SourceFormat::DelimitedText),
            "xlsx" | "xlsm" | "xlsb" | "xls" => Some(SourceFormat::Spreadsheet),
            "dta" | "sas7bdat" => Some(SourceFormat::StatisticalPackage),
            "h5" | "hdf5" | "hdf" => Some(SourceFormat::HierarchicalBinary),
            "mat" => Some(SourceFormat::MatrixBinary),
            "db" | "sqlite" | "sqlite3" => Some(SourceFormat::RelationalQuery),
            _ => None,
        }
    }

    /// Classify a location: connection strings by scheme, paths by
    /// extension.
    pub fn for_location(location: &str) -> Result<SourceFormat> {
        if location.contains("://") {
            return if location.starts_with("sqlite:") {
                Ok(SourceFormat::RelationalQuery)
            } else {
                Err(DataError::UnsupportedFormat(location.to_string()))
            };
        }
        let ext = Path::new(location)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        SourceFormat::from_extension(ext)
            .ok_or_else(|| DataError::UnsupportedFormat(format!(".{ext}")))
    }
}

// ---------------------------------------------------------------------------
// Shaping options and the descriptor
// ---------------------------------------------------------------------------

/// Column subset request, by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelect {
    Indices(Vec<usize>),
    Names(Vec<String>),
}

/// Caller-supplied parameters controlling what a load returns. Fields not
/// relevant to a format are ignored by its adapter.
#[derive(Debug, Clone)]
pub struct ShapingOptions {
    /// Field delimiter for delimited text (default: comma)
    pub delimiter: u8,
    /// Header rows to consume; `None` picks the format default
    pub header_rows: Option<usize>,
    /// Columns to retain (default: all)
    pub columns: Option<ColumnSelect>,
    /// Per-column inference vs force-all-to-text
    pub dtype_hint: DtypeHint,
    /// Cap on rows read
    pub row_limit: Option<usize>,
    /// Sheet selection for spreadsheets (default: first sheet)
    pub sheet: Option<SheetSelector>,
    /// SQL statement for relational-query sources
    pub query: Option<String>,
    /// Slash-separated dataset path for hierarchical-binary sources
    pub dataset: Option<String>,
}

impl Default for ShapingOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header_rows: None,
            columns: None,
            dtype_hint: DtypeHint::Infer,
            row_limit: None,
            sheet: None,
            query: None,
            dataset: None,
        }
    }
}

/// Everything needed to perform one load: format tag, location (path or
/// connection string), shaping options.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub format: SourceFormat,
    pub location: String,
    pub options: ShapingOptions,
}

impl SourceDescriptor {
    pub fn new(format: SourceFormat, location: impl Into<String>) -> Self {
        SourceDescriptor {
            format,
            location: location.into(),
            options: ShapingOptions::default(),
        }
    }

    /// Build a descriptor by classifying the location.
    pub fn for_location(location: impl Into<String>) -> Result<Self> {
        let location = location.into();
        let format = SourceFormat::for_location(&location)?;
        Ok(SourceDescriptor {
            format,
            location,
            options: ShapingOptions::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// A load result. Row-oriented sources produce tables; the binary array
/// containers keep their own shapes instead of being flattened into one.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutput {
    /// Rows under named columns
    Table(Table),
    /// One N-dimensional array (hierarchical-binary)
    Array(ArrayD<f64>),
    /// Named arrays (matrix-binary)
    NamedArrays(BTreeMap<String, ArrayD<f64>>),
}

impl LoadOutput {
    /// The table inside, if this output is row-oriented.
    pub fn into_table(self) -> Option<Table> {
        match self {
            LoadOutput::Table(t) => Some(t),
            _ => None,
        }
    }
}

fn shape_table(mut table: Table, options: &ShapingOptions) -> Result<Table> {
    if let Some(select) = &options.columns {
        table = match select {
            ColumnSelect::Indices(idx) => table.select_by_indices(idx)?,
            ColumnSelect::Names(names) => table.select(names)?,
        };
    }
    if let Some(limit) = options.row_limit {
        table.truncate(limit);
    }
    Ok(table)
}

/// Load the source a descriptor points at, via the adapter matching its
/// format tag.
pub fn load(descriptor: &SourceDescriptor) -> Result<LoadOutput> {
    let options = &descriptor.options;
    let location = descriptor.location.as_str();

    match descriptor.format {
        SourceFormat::DelimitedText => {
            let opts = DelimitedOptions {
                delimiter: options.delimiter,
                header_rows: options.header_rows.unwrap_or(1),
                columns: None, // column subset handled on the table, by index or name
                row_limit: options.row_limit,
            };
            let table = delimited::load_mixed(location, options.dtype_hint, &opts)?;
            Ok(LoadOutput::Table(shape_table(table, options)?))
        }
        SourceFormat::Spreadsheet => {
            let selector = options
                .sheet
                .clone()
                .unwrap_or(SheetSelector::Index(0));
            let opts = SheetOptions {
                skip_rows: Vec::new(),
                columns: None,
                rename: None,
                row_limit: options.row_limit,
            };
            let table = spreadsheet::load_sheet(location, selector, &opts)?;
            Ok(LoadOutput::Table(shape_table(table, options)?))
        }
        SourceFormat::StatisticalPackage => {
            let table = statpkg::load(location)?;
            Ok(LoadOutput::Table(shape_table(table, options)?))
        }
        SourceFormat::MatrixBinary => Ok(LoadOutput::NamedArrays(matrix::load(location)?)),
        SourceFormat::HierarchicalBinary => load_hierarchical(location, options),
        SourceFormat::RelationalQuery => {
            let sql = options.query.as_deref().ok_or_else(|| {
                DataError::QueryExecutionFailure(
                    "no SQL statement in the source descriptor".to_string(),
                )
            })?;
            let table = sql::query_to_table(location, sql)?;
            Ok(LoadOutput::Table(shape_table(table, options)?))
        }
    }
}

#[cfg(feature = "hdf5")]
fn load_hierarchical(location: &str, options: &ShapingOptions) -> Result<LoadOutput> {
    let dataset = options.dataset.as_deref().ok_or_else(|| {
        DataError::Hierarchy("no dataset path in the source descriptor".to_string())
    })?;
    let file = crate::formats::hier::HierFile::open(location)?;
    Ok(LoadOutput::Array(file.read_array(dataset)?))
}

#[cfg(not(feature = "hdf5"))]
fn load_hierarchical(_location: &str, _options: &ShapingOptions) -> Result<LoadOutput> {
    Err(DataError::UnsupportedFormat(
        "hierarchical-binary (built without the `hdf5` feature)".to_string(),
    ))
}
