//! Error types shared by every adapter.

use thiserror::Error;

/// Result type for load operations
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading a source.
///
/// Loads are all-or-nothing: an adapter that hits any of these fails fast
/// and returns no partial result.
#[derive(Debug, Error)]
pub enum DataError {
    /// The dispatcher cannot map a format tag to an adapter
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A homogeneous-type load encountered a cell that does not coerce
    #[error("cannot coerce {value:?} at row {row}, column {column}")]
    TypeMismatch {
        row: usize,
        column: usize,
        value: String,
    },

    /// Sheet name or index out of range
    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    /// Rename list, column subset, or row width does not match
    #[error("expected {expected} columns, found {found} ({context})")]
    ShapeMismatch {
        expected: usize,
        found: usize,
        context: String,
    },

    /// Binary header or data element is malformed
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// Could not open the relational connection
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The relational engine rejected the statement; its message is kept verbatim
    #[error("query execution failure: {0}")]
    QueryExecutionFailure(String),

    /// Workbook could not be opened or parsed
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Hierarchical container error
    #[error("hierarchical container error: {0}")]
    Hierarchy(String),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<calamine::XlsxError> for DataError {
    fn from(err: calamine::XlsxError) -> Self {
        DataError::Workbook(err.to_string())
    }
}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for DataError {
    fn from(err: hdf5::Error) -> Self {
        DataError::Hierarchy(err.to_string())
    }
}
