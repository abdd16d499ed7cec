/// Format adapters: one module per source family, each implementing the
/// common load contract against its own backend.
///
/// ```text
///   .csv/.tsv      .xlsx        .dta          .mat        .h5       sqlite://
///       │            │            │             │           │           │
///       ▼            ▼            ▼             ▼           ▼           ▼
///  ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌─────────┐
///  │delimited│ │spreadsheet│ │ statpkg │ │  matrix  │ │  hier  │ │   sql   │
///  └─────────┘ └───────────┘ └─────────┘ └──────────┘ └────────┘ └─────────┘
///       │            │            │             │           │           │
///       ▼            ▼            ▼             ▼           ▼           ▼
///    Table /      Table        Table      name → array   ArrayD     Cursor /
///    Array2                                  (BTreeMap)              Table
/// ```
pub mod delimited;
pub mod matrix;
pub mod spreadsheet;
pub mod sql;
pub mod statpkg;

#[cfg(feature = "hdf5")]
pub mod hier;
