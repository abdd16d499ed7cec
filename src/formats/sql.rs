//! Relational-query adapter over SQLite.
//!
//! SQL text is passed to the engine verbatim; there is no parsing,
//! parameterization, or injection defense here. Connections are scoped:
//! dropping a [`SqlSource`] releases the handle on every exit path.

use std::collections::VecDeque;
use std::path::Path;

use rusqlite::Connection;

use crate::error::{DataError, Result};
use crate::table::{Table, Value};

const SQLITE_SCHEME: &str = "sqlite://";

/// Resolve a `sqlite:///<path>` connection string. An empty path selects an
/// in-memory database.
fn database_path(conn_str: &str) -> Result<Option<&str>> {
    let rest = conn_str.strip_prefix(SQLITE_SCHEME).ok_or_else(|| {
        DataError::ConnectionFailure(format!(
            "unsupported connection string {conn_str:?} (expected sqlite:///<path>)"
        ))
    })?;
    let path = rest.strip_prefix('/').unwrap_or(rest);
    Ok(if path.is_empty() { None } else { Some(path) })
}

/// An open relational connection.
pub struct SqlSource {
    conn: Connection,
}

impl SqlSource {
    /// Connect using a `sqlite:///<path>` connection string.
    pub fn connect(conn_str: &str) -> Result<Self> {
        let conn = match database_path(conn_str)? {
            Some(path) => Connection::open(Path::new(path)),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| DataError::ConnectionFailure(e.to_string()))?;
        log::debug!("connected to {conn_str}");
        Ok(SqlSource { conn })
    }

    /// Wrap an already-open connection (useful for in-memory fixtures).
    pub fn from_connection(conn: Connection) -> Self {
        SqlSource { conn }
    }

    /// Run a statement and return a cursor over its result rows.
    ///
    /// Column names come from the statement's own metadata, so the result
    /// is labeled even though the engine hands back bare rows. The row set
    /// is collected here; the cursor only tracks the read position.
    pub fn execute(&self, sql: &str) -> Result<Cursor> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DataError::QueryExecutionFailure(e.to_string()))?;

        let column_count = stmt.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| stmt.column_name(i).unwrap_or("?").to_string())
            .collect();

        let mut raw = stmt
            .query([])
            .map_err(|e| DataError::QueryExecutionFailure(e.to_string()))?;

        let mut rows = VecDeque::new();
        while let Some(row) = raw
            .next()
            .map_err(|e| DataError::QueryExecutionFailure(e.to_string()))?
        {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = match row.get_ref(i) {
                    Ok(rusqlite::types::ValueRef::Null) => Value::Null,
                    Ok(rusqlite::types::ValueRef::Integer(n)) => Value::Int(n),
                    Ok(rusqlite::types::ValueRef::Real(f)) => Value::Float(f),
                    Ok(rusqlite::types::ValueRef::Text(s)) => {
                        Value::Text(String::from_utf8_lossy(s).into_owned())
                    }
                    Ok(rusqlite::types::ValueRef::Blob(b)) => {
                        Value::Text(String::from_utf8_lossy(b).into_owned())
                    }
                    Err(e) => {
                        return Err(DataError::QueryExecutionFailure(e.to_string()))
                    }
                };
                values.push(value);
            }
            rows.push_back(values);
        }

        log::debug!("query produced {} rows x {} columns", rows.len(), column_count);
        Ok(Cursor { columns, rows })
    }

    /// Names of the user tables, in name order.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut cursor = self.execute(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        Ok(cursor
            .fetch_all()
            .rows()
            .iter()
            .filter_map(|row| row[0].as_str().map(str::to_string))
            .collect())
    }
}

/// Read position over an executed query's rows. Fetching advances the
/// cursor; re-running the statement is the only way to start over.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl Cursor {
    /// Column names from the statement metadata.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Take the next `n` rows (fewer near the end) as a [`Table`].
    pub fn fetch_n(&mut self, n: usize) -> Table {
        let taken: Vec<Vec<Value>> = (0..n).filter_map(|_| self.rows.pop_front()).collect();
        Table::from_parts(self.columns.clone(), taken)
    }

    /// Take every remaining row as a [`Table`].
    pub fn fetch_all(&mut self) -> Table {
        self.fetch_n(self.rows.len())
    }
}

/// One-call convenience: connect, execute, fetch everything, release.
pub fn query_to_table(conn_str: &str, sql: &str) -> Result<Table> {
    let source = SqlSource::connect(conn_str)?;
    let mut cursor = source.execute(sql)?;
    Ok(cursor.fetch_all())
}
