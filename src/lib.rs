//! tabsource – uniform loaders for heterogeneous tabular data sources.
//!
//! Every supported format goes through the same motions: describe the
//! source (path or connection string, plus shaping options), invoke one
//! format adapter, get back an in-memory result the display layer can
//! consume. Row-oriented sources produce a [`Table`]; the binary array
//! containers keep their native shapes.
//!
//! Supported sources:
//! * delimited text (CSV/TSV) – homogeneous arrays or mixed-type tables
//! * spreadsheet workbooks (.xlsx) – sheet listing and shaped sheet loads
//! * statistical-package binaries (Stata .dta)
//! * matrix binaries (MAT 5) – named `f64` arrays
//! * hierarchical binaries (HDF5, behind the `hdf5` cargo feature)
//! * relational queries over SQLite connection strings
//!
//! Loads are synchronous and all-or-nothing; every OS handle an adapter
//! opens is scoped to the call (or to a value whose drop releases it).

pub mod error;
pub mod formats;
pub mod source;
pub mod table;

pub use error::{DataError, Result};
pub use formats::delimited::{
    load_homogeneous, load_mixed, DelimitedOptions, Dtype, DtypeHint, HomogeneousArray,
};
pub use formats::spreadsheet::{list_sheets, load_sheet, SheetOptions, SheetSelector};
pub use formats::sql::{query_to_table, Cursor, SqlSource};
pub use source::{load, ColumnSelect, LoadOutput, ShapingOptions, SourceDescriptor, SourceFormat};
pub use table::{Table, Value};
