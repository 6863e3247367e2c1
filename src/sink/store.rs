//! SQLite-backed structured store.
//!
//! Holds the metadata columns and the computed features for querying.
//! Reserved schema columns are not persisted here. Table columns are derived
//! from the frozen schema so the two sinks cannot drift apart.

use crate::core::{Cell, Column, ColumnKind, SessionRecord, ValueType, SCHEMA};
use crate::sink::{RecordSink, SinkError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

const TABLE: &str = "login_behavior";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    insert_sql: String,
}

/// Columns persisted to the store, in schema order.
pub fn stored_columns() -> impl Iterator<Item = Column> {
    SCHEMA
        .into_iter()
        .filter(|c| c.kind() != ColumnKind::Reserved)
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::Store(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(store_error)?;
        Self::init(conn)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(&create_table_sql()).map_err(store_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
            insert_sql: insert_sql(),
        })
    }
}

impl RecordSink for SqliteStore {
    fn name(&self) -> &'static str {
        "store"
    }

    fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        let mut values = vec![Value::Text(Uuid::new_v4().to_string())];
        values.extend(stored_columns().map(|c| sql_value(c, record.cell(c))));

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(&self.insert_sql, params_from_iter(values))
            .map_err(store_error)?;
        Ok(())
    }
}

fn store_error(e: rusqlite::Error) -> SinkError {
    SinkError::Store(e.to_string())
}

fn sql_type(column: Column) -> &'static str {
    match column.value_type() {
        ValueType::Text => "TEXT",
        ValueType::Flag | ValueType::Count => "INTEGER",
        ValueType::Real => "REAL",
    }
}

fn create_table_sql() -> String {
    let columns: Vec<String> = stored_columns()
        .map(|c| {
            let nullable = if c == Column::SessionId { "" } else { " NOT NULL" };
            format!("    {} {}{}", c.name(), sql_type(c), nullable)
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (\n    id TEXT PRIMARY KEY,\n{}\n);\n\
         CREATE INDEX IF NOT EXISTS idx_{TABLE}_session ON {TABLE}(session_id);\n\
         CREATE INDEX IF NOT EXISTS idx_{TABLE}_ts ON {TABLE}(timestamp_utc);",
        columns.join(",\n")
    )
}

fn insert_sql() -> String {
    let names: Vec<&str> = std::iter::once("id")
        .chain(stored_columns().map(|c| c.name()))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

fn sql_value(column: Column, cell: Cell) -> Value {
    match cell {
        Cell::Text(Some(s)) => Value::Text(s),
        Cell::Text(None) => Value::Null,
        Cell::Flag(b) => Value::Integer(i64::from(b)),
        Cell::Number(v) if column.value_type() == ValueType::Count => Value::Integer(v as i64),
        Cell::Number(v) => Value::Real(v),
    }
}
