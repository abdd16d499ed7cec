//! Cross-format end-to-end tests.
//!
//! Workbook fixtures are generated on the fly as raw OOXML zips (inline
//! strings only, no shared-string table), so no binary files live in the
//! repository.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use tabsource::{
    list_sheets, load, load_mixed, load_sheet, query_to_table, ColumnSelect, DataError,
    DelimitedOptions, DtypeHint, SheetOptions, SourceDescriptor, SourceFormat, Table, Value,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Workbook fixture builder
// ---------------------------------------------------------------------------

/// One worksheet cell: text or number.
enum Cell {
    S(&'static str),
    N(f64),
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut body = String::new();
    for (r, row) in rows.iter().enumerate() {
        body.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            let col = (b'A' + c as u8) as char;
            match cell {
                Cell::S(s) => body.push_str(&format!(
                    "<c r=\"{col}{}\" t=\"inlineStr\"><is><t>{s}</t></is></c>",
                    r + 1
                )),
                Cell::N(n) => {
                    body.push_str(&format!("<c r=\"{col}{}\"><v>{n}</v></c>", r + 1))
                }
            }
        }
        body.push_str("</row>");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
         <sheetData>{body}</sheetData></worksheet>"
    )
}

fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<Cell>>)]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let mut content_types = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
    );
    for i in 1..=sheets.len() {
        content_types.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        ));
    }
    content_types.push_str("</Types>");
    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(
        b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
          <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
          <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
          </Relationships>",
    )?;

    let mut workbook = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets>",
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        workbook.push_str(&format!(
            "<sheet name=\"{name}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            i + 1,
            i + 1
        ));
    }
    workbook.push_str("</sheets></workbook>");
    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook.as_bytes())?;

    let mut rels = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for i in 1..=sheets.len() {
        rels.push_str(&format!(
            "<Relationship Id=\"rId{i}\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
             Target=\"worksheets/sheet{i}.xml\"/>"
        ));
    }
    rels.push_str("</Relationships>");
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(rels.as_bytes())?;

    for (i, (_, rows)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(sheet_xml(rows).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

/// A two-sheet mortality workbook: header row plus two country rows per
/// sheet.
fn battledeath_workbook(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("battledeath.xlsx");
    write_xlsx(
        &path,
        &[
            (
                "2002",
                vec![
                    vec![Cell::S("War(country)"), Cell::S("2002")],
                    vec![Cell::S("Afghanistan"), Cell::N(36.08)],
                    vec![Cell::S("Albania"), Cell::N(0.13)],
                ],
            ),
            (
                "2004",
                vec![
                    vec![Cell::S("War, age-adjusted mortality due to"), Cell::S("2004")],
                    vec![Cell::S("Afghanistan"), Cell::N(9.45)],
                    vec![Cell::S("Albania"), Cell::N(0.13)],
                ],
            ),
        ],
    )?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Spreadsheet scenarios
// ---------------------------------------------------------------------------

#[test]
fn workbook_sheet_listing_is_ordered() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;
    assert_eq!(list_sheets(&path)?, vec!["2002", "2004"]);
    Ok(())
}

#[test]
fn sheet_by_name_and_by_index_agree() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    let by_name = load_sheet(&path, "2004", &SheetOptions::default())?;
    let by_index = load_sheet(&path, 1, &SheetOptions::default())?;
    assert_eq!(by_name, by_index);
    assert_eq!(by_name.len(), 2);
    Ok(())
}

#[test]
fn skip_header_with_positional_names() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    // Drop the header row and name the columns ourselves: the first data
    // row is then the workbook's second physical row.
    let options = SheetOptions {
        skip_rows: vec![0],
        rename: Some(vec!["Country".into(), "AAM due to War (2002)".into()]),
        ..Default::default()
    };
    let t = load_sheet(&path, "2004", &options)?;
    assert_eq!(t.get(0, "Country"), Some(&Value::Text("Afghanistan".into())));
    assert_eq!(t.get(0, "AAM due to War (2002)"), Some(&Value::Float(9.45)));
    Ok(())
}

#[test]
fn first_column_only_with_rename() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    let options = SheetOptions {
        skip_rows: vec![0],
        columns: Some(vec![0]),
        rename: Some(vec!["Country".into()]),
        ..Default::default()
    };
    let t = load_sheet(&path, 1, &options)?;
    assert_eq!(t.width(), 1);
    assert_eq!(t.get(1, "Country"), Some(&Value::Text("Albania".into())));
    Ok(())
}

#[test]
fn rename_length_mismatch_fails() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    let options = SheetOptions {
        rename: Some(vec!["Country".into()]),
        ..Default::default()
    };
    let err = load_sheet(&path, "2002", &options).unwrap_err();
    assert!(matches!(
        err,
        DataError::ShapeMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
    Ok(())
}

#[test]
fn missing_sheet_fails() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    assert!(matches!(
        load_sheet(&path, "2006", &SheetOptions::default()).unwrap_err(),
        DataError::SheetNotFound(_)
    ));
    assert!(matches!(
        load_sheet(&path, 7, &SheetOptions::default()).unwrap_err(),
        DataError::SheetNotFound(_)
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV round-trip
// ---------------------------------------------------------------------------

#[test]
fn csv_round_trip_preserves_table() -> Result<()> {
    init_logging();
    let original = Table::new(
        vec!["country".into(), "deaths".into(), "year".into(), "flagged".into()],
        vec![
            vec![
                Value::Text("Afghanistan".into()),
                Value::Float(36.08),
                Value::Int(2002),
                Value::Bool(false),
            ],
            vec![
                Value::Text("Albania".into()),
                Value::Null,
                Value::Int(2004),
                Value::Bool(true),
            ],
            vec![
                Value::Text("Angola".into()),
                Value::Float(14.0),
                Value::Int(2002),
                Value::Bool(false),
            ],
        ],
    )?;

    let dir = TempDir::new()?;
    let path = dir.path().join("round_trip.csv");
    original.to_csv_file(&path)?;

    let options = DelimitedOptions {
        header_rows: 1,
        ..Default::default()
    };
    let reloaded = load_mixed(&path, DtypeHint::Infer, &options)?;
    assert_eq!(reloaded, original);
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatcher end-to-end
// ---------------------------------------------------------------------------

#[test]
fn dispatch_spreadsheet_by_descriptor() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = battledeath_workbook(&dir)?;

    let mut desc = SourceDescriptor::for_location(path.display().to_string())?;
    assert_eq!(desc.format, SourceFormat::Spreadsheet);
    desc.options.sheet = Some("2002".into());

    let table = load(&desc)?.into_table().unwrap();
    assert_eq!(table.columns(), &["War(country)", "2002"]);
    assert_eq!(table.len(), 2);
    Ok(())
}

#[test]
fn dispatch_relational_by_descriptor() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let db_path = dir.path().join("chinook.sqlite");

    {
        let conn = rusqlite::Connection::open(&db_path)?;
        conn.execute_batch(
            "CREATE TABLE Employee (EmployeeId INTEGER, LastName TEXT);
             INSERT INTO Employee VALUES (5, 'Johnson'), (6, 'Mitchell'), (7, 'King');",
        )?;
    }

    let mut desc = SourceDescriptor::new(
        SourceFormat::RelationalQuery,
        format!("sqlite:///{}", db_path.display()),
    );
    desc.options.query =
        Some("SELECT * FROM Employee WHERE EmployeeId >= 6 ORDER BY EmployeeId".into());
    desc.options.columns = Some(ColumnSelect::Names(vec!["LastName".into()]));

    let table = load(&desc)?.into_table().unwrap();
    assert_eq!(table.columns(), &["LastName"]);
    assert_eq!(table.get(0, "LastName"), Some(&Value::Text("Mitchell".into())));
    Ok(())
}

#[test]
fn query_to_table_releases_the_connection() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let db_path = dir.path().join("scoped.sqlite");

    {
        let conn = rusqlite::Connection::open(&db_path)?;
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")?;
    }
    let conn_str = format!("sqlite:///{}", db_path.display());

    let t = query_to_table(&conn_str, "SELECT x FROM t")?;
    assert_eq!(t.len(), 1);

    // The helper owns its connection for exactly one call; a fresh
    // connect-query cycle must work immediately after.
    let again = query_to_table(&conn_str, "SELECT COUNT(*) AS n FROM t")?;
    assert_eq!(again.get(0, "n"), Some(&Value::Int(1)));
    Ok(())
}

#[test]
fn failed_query_returns_no_partial_result() -> Result<()> {
    init_logging();
    let err = query_to_table("sqlite://", "SELECT * FROM missing").unwrap_err();
    assert!(matches!(err, DataError::QueryExecutionFailure(_)));
    Ok(())
}
