//! Error types for importdb.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`DatabaseError`]
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors raised by the database layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    // Schema lookup errors
    #[error("Unknown schema kind: {name}")]
    UnknownSchemaKind { name: String },

    // Connection errors
    #[error("Failed to open database at '{}': {source}", .path.display())]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to close database at '{}': {source}", .path.display())]
    DatabaseClose {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Connection to '{}' is already closed", .path.display())]
    ConnectionClosed { path: PathBuf },

    #[error("Statement failed: {source}\n{sql}")]
    Statement {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    // Migration errors
    #[error("Migration {version} ({name}) failed: {source}")]
    Migration {
        version: String,
        name: String,
        #[source]
        source: Box<DatabaseError>,
    },

    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateMigrationVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("Migration {version} is pending but sorts before applied migration {applied}")]
    OutOfOrderMigration { version: String, applied: String },

    // Value conversion errors
    #[error("Cannot decode {kind}: {message}")]
    Codec { kind: &'static str, message: String },

    // IO errors
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DatabaseError {
    /// Wrap a rusqlite failure together with the statement that caused it
    pub fn statement(sql: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Statement {
            sql: sql.into(),
            source,
        }
    }

    pub(crate) fn codec(kind: &'static str, message: impl ToString) -> Self {
        Self::Codec {
            kind,
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
