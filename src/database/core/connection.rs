//! Database connection management
//!
//! `DatabaseConn` owns exactly one SQLite handle. Parameters are bound through
//! the value codec and rows come back as lazy, forward-only iterators.
//! The handle is released by [`DatabaseConn::close`], which is idempotent, or
//! by `Drop` when the owner goes out of scope without closing.

use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{ToSql, Value as SqlValue};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::codec::{self, Value, ValueKind};
use crate::error::{DatabaseError, Result};

const IN_MEMORY: &str = ":memory:";

/// Core database connection wrapper
///
/// Exclusively owned by the scope that opened it. Prefer
/// [`DatabaseConn::scoped`]; use [`DatabaseConn::open`] and
/// [`DatabaseConn::close`] when the handle has to outlive a single block.
pub struct DatabaseConn {
    path: PathBuf,
    conn: Option<Connection>,
}

impl std::fmt::Debug for DatabaseConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConn")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DatabaseConn {
    /// Open the database at `path`, creating the file if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| DatabaseError::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        Self::configured(path, conn)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(IN_MEMORY);
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        Self::configured(path, conn)
    }

    /// Open `path`, run `f` with the connection, and close it on every exit path
    ///
    /// The connection is closed before this returns, whether `f` succeeds,
    /// returns early with an error, or unwinds. An error from `f` takes
    /// precedence over a failure to close.
    pub fn scoped<T, E, F>(path: impl AsRef<Path>, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut DatabaseConn) -> std::result::Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut db = DatabaseConn::open(path)?;
        let result = f(&mut db);
        let closed = db.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    fn configured(path: PathBuf, conn: Connection) -> Result<Self> {
        // A file that is not a database only fails once it is read, so the
        // pragmas double as the corruption check.
        configure(&conn).map_err(|source| DatabaseError::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        debug!("Opened database at {}", path.display());
        Ok(DatabaseConn {
            path,
            conn: Some(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Get the underlying rusqlite connection (for advanced queries)
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| DatabaseError::ConnectionClosed {
            path: self.path.clone(),
        })
    }

    /// Execute a single statement with positional parameters
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.connection()?
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(|e| DatabaseError::statement(sql, e))
    }

    /// Execute a single statement with named parameters, e.g. `:name`
    pub fn execute_named(&self, sql: &str, params: &[(&str, Value)]) -> Result<usize> {
        let named = named_params(params);
        self.connection()?
            .execute(sql, named.as_slice())
            .map_err(|e| DatabaseError::statement(sql, e))
    }

    /// Execute a script of one or more statements without parameters
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection()?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::statement(sql, e))
    }

    /// Prepare a statement for repeated or long-lived querying
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let stmt = self
            .connection()?
            .prepare(sql)
            .map_err(|e| DatabaseError::statement(sql, e))?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        Ok(Statement {
            sql: sql.to_string(),
            stmt,
            columns,
        })
    }

    /// Run a read statement and hand its rows to `f` as a lazy iterator
    ///
    /// ```rust,ignore
    /// let names = db.query("SELECT name FROM badges WHERE enabled = ?1", &[true.into()], |rows| {
    ///     rows.map(|row| Ok(row?.text("name").unwrap_or_default().to_string()))
    ///         .collect::<Result<Vec<_>>>()
    /// })?;
    /// ```
    pub fn query<T, F>(&self, sql: &str, params: &[Value], f: F) -> Result<T>
    where
        F: FnOnce(Rows<'_>) -> Result<T>,
    {
        let mut stmt = self.prepare(sql)?;
        let rows = stmt.query(params)?;
        f(rows)
    }

    /// Like [`DatabaseConn::query`], binding named parameters, e.g. `:name`
    pub fn query_named<T, F>(&self, sql: &str, params: &[(&str, Value)], f: F) -> Result<T>
    where
        F: FnOnce(Rows<'_>) -> Result<T>,
    {
        let mut stmt = self.prepare(sql)?;
        let rows = stmt.query_named(params)?;
        f(rows)
    }

    /// Run a read statement and collect every row
    pub fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query(sql, params, |rows| rows.collect())
    }

    /// Run a read statement and return its first row, if any
    pub fn query_row(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        self.query(sql, params, |mut rows| rows.next().transpose())
    }

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`; rolls back when it returns `Err` or
    /// unwinds.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&DatabaseConn) -> std::result::Result<T, E>,
        E: From<DatabaseError>,
    {
        let tx = self
            .connection()?
            .unchecked_transaction()
            .map_err(|e| DatabaseError::statement("BEGIN", e))?;
        let value = f(self)?;
        tx.commit()
            .map_err(|e| DatabaseError::statement("COMMIT", e))?;
        Ok(value)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let row = self.query_row(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type='table' AND name=?1",
            &[table_name.into()],
        )?;
        Ok(row.and_then(|r| r.integer("count")).unwrap_or(0) > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", quote_identifier(table_name));
        let row = self.query_row(&sql, &[])?;
        Ok(row.and_then(|r| r.integer("count")).unwrap_or(0) as u64)
    }

    /// Release the handle; closing an already closed connection is a no-op
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        debug!("Closing database at {}", self.path.display());
        // On failure rusqlite hands the connection back; dropping it releases
        // the handle all the same.
        conn.close().map_err(|(_, source)| DatabaseError::DatabaseClose {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for DatabaseConn {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

fn named_params<'a>(params: &'a [(&'a str, Value)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (*name, value as &dyn ToSql))
        .collect()
}

/// Quote an identifier for interpolation into SQL
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Configure the connection for single-process import workloads
fn configure(conn: &Connection) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    debug!("journal_mode={}", journal_mode);

    conn.execute_batch(
        "PRAGMA synchronous=NORMAL;
         PRAGMA temp_store=MEMORY;
         PRAGMA foreign_keys=ON;",
    )
}

/// A prepared statement bound to its connection
pub struct Statement<'conn> {
    sql: String,
    stmt: rusqlite::Statement<'conn>,
    columns: Arc<[String]>,
}

impl Statement<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Start a new cursor over this statement
    ///
    /// The returned rows borrow the statement, so it cannot be re-run until
    /// they are dropped.
    pub fn query(&mut self, params: &[Value]) -> Result<Rows<'_>> {
        let rows = self
            .stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(|e| DatabaseError::statement(&self.sql, e))?;
        Ok(Rows {
            sql: &self.sql,
            rows,
            columns: Arc::clone(&self.columns),
            done: false,
        })
    }

    /// Start a new cursor, binding named parameters
    pub fn query_named(&mut self, params: &[(&str, Value)]) -> Result<Rows<'_>> {
        let named = named_params(params);
        let rows = self
            .stmt
            .query(named.as_slice())
            .map_err(|e| DatabaseError::statement(&self.sql, e))?;
        Ok(Rows {
            sql: &self.sql,
            rows,
            columns: Arc::clone(&self.columns),
            done: false,
        })
    }

    pub fn execute(&mut self, params: &[Value]) -> Result<usize> {
        self.stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(|e| DatabaseError::statement(&self.sql, e))
    }
}

/// Lazy, single-pass sequence of rows from an open cursor
///
/// Once exhausted (or after an error) it keeps yielding `None`.
pub struct Rows<'stmt> {
    sql: &'stmt str,
    rows: rusqlite::Rows<'stmt>,
    columns: Arc<[String]>,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let next = match self.rows.next() {
            Ok(Some(row)) => (0..self.columns.len())
                .map(|idx| row.get::<_, SqlValue>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(|values| Row {
                    columns: Arc::clone(&self.columns),
                    values,
                }),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };

        if next.is_err() {
            self.done = true;
        }
        Some(next.map_err(|e| DatabaseError::statement(self.sql, e)))
    }
}

impl FusedIterator for Rows<'_> {}

/// One result row: column names mapped to stored values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Stored value of `column`, if the row has that column
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Decode `column` as a value of `kind`
    pub fn value(&self, column: &str, kind: ValueKind) -> Result<Value> {
        let stored = self.get(column).ok_or_else(|| {
            DatabaseError::codec(kind.name(), format!("no column named '{}'", column))
        })?;
        Value::decode(kind, stored)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            SqlValue::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            SqlValue::Real(r) => Some(*r),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn blob(&self, column: &str) -> Option<&[u8]> {
        match self.get(column)? {
            SqlValue::Blob(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn boolean(&self, column: &str) -> bool {
        self.get(column).is_some_and(codec::to_boolean)
    }

    pub fn datetime(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        codec::to_datetime(self.text(column))
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        codec::to_date(self.text(column))
    }

    pub fn json<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>> {
        codec::from_json(self.text(column))
    }

    /// Consume the row into a column-keyed map
    pub fn into_map(self) -> BTreeMap<String, SqlValue> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}
