//! # In-Memory Relational Store
//!
//! One private in-memory SQLite database per fetch result. Each view becomes a
//! table of text columns; callers run ad-hoc read-only SQL over them.
//!
//! The connection lives behind a `Mutex` because `rusqlite::Connection` is not
//! `Sync`. It is closed when the store is dropped.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Table {0:?} already exists")]
    DuplicateTable(String),

    #[error("Table {table:?} declares column {column:?} more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("Table {0:?} does not exist")]
    UnknownTable(String),

    #[error("Table {table:?} has {expected} columns but the row has {actual} values")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Only read-only statements may be queried: {0}")]
    NotReadOnly(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Rows returned by [`RelationalStore::query`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Each row as nullable text cells.
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct RelationalStore {
    conn: Mutex<Connection>,
    /// Column names per table, fixed at creation.
    schemas: HashMap<String, Vec<String>>,
    /// Table names in creation order.
    order: Vec<String>,
    /// Lowercased table names; SQLite compares identifiers ignoring ASCII case.
    folded: HashSet<String>,
}

impl RelationalStore {
    /// Opens a fresh private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        debug!("in-memory relational store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            schemas: HashMap::new(),
            order: Vec::new(),
            folded: HashSet::new(),
        })
    }

    /// Creates `name` with the given text columns, in order.
    pub fn create_table(&mut self, name: &str, columns: &[String]) -> Result<(), StoreError> {
        let key = name.to_ascii_lowercase();
        if self.folded.contains(&key) {
            return Err(StoreError::DuplicateTable(name.to_string()));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in columns {
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(StoreError::DuplicateColumn {
                    table: name.to_string(),
                    column: column.clone(),
                });
            }
        }

        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        let sql = format!("CREATE TABLE {} ({})", quote_ident(name), column_defs.join(", "));
        self.conn.lock().execute_batch(&sql)?;

        debug!(table = name, columns = columns.len(), "table created");
        self.schemas.insert(name.to_string(), columns.to_vec());
        self.order.push(name.to_string());
        self.folded.insert(key);
        Ok(())
    }

    /// Appends one row. `values` must match the table's column count.
    pub fn insert_row(&self, name: &str, values: &[String]) -> Result<(), StoreError> {
        let columns = self
            .schemas
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))?;
        if values.len() != columns.len() {
            return Err(StoreError::Arity {
                table: name.to_string(),
                expected: columns.len(),
                actual: values.len(),
            });
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!("INSERT INTO {} VALUES ({})", quote_ident(name), placeholders);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Runs a read-only statement and collects every row as text.
    pub fn query(&self, sql: &str) -> Result<QueryResult, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(StoreError::NotReadOnly(sql.to_string()));
        }

        let column_count = stmt.column_count();
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let val = match row.get_ref(i)? {
                        ValueRef::Null => None,
                        ValueRef::Integer(n) => Some(n.to_string()),
                        ValueRef::Real(f) => Some(f.to_string()),
                        ValueRef::Text(s) => Some(String::from_utf8_lossy(s).to_string()),
                        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).to_string()),
                    };
                    values.push(val);
                }
                Ok(values)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryResult { columns, rows })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Table names in creation order.
    pub fn tables(&self) -> &[String] {
        &self.order
    }

    pub fn columns(&self, name: &str) -> Option<&[String]> {
        self.schemas.get(name).map(Vec::as_slice)
    }
}

/// Double-quotes an SQL identifier, escaping embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
