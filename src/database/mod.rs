//! Database module
//!
//! This module provides all database functionality for importdb, organized into:
//!
//! - **core**: connections, value codec, schema locator and migrator
//! - **import**: `ImportDatabase`, an up-to-date logical database with its connection
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── codec       # host values <-> SQLite storage classes
//! │   ├── connection  # DatabaseConn, Statement, Rows, Row
//! │   ├── locator     # SchemaKind, SchemaLocator
//! │   └── migrator    # Migrator, SchemaManager, migration units
//! │
//! └── import          # ImportDatabase
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use importdb::database::{self, SchemaLocator};
//!
//! let locator = SchemaLocator::new("/srv/import");
//! database::migrate("/data/mappings.db", locator.resolve("mappings_db")?)?;
//!
//! database::scoped("/data/mappings.db", |db| {
//!     db.execute(
//!         "INSERT INTO users (original_id, discourse_id) VALUES (?1, ?2)",
//!         &["u-17".into(), 42.into()],
//!     )
//! })?;
//! ```

pub mod core;
pub mod import;

use std::path::Path;

pub use self::core::codec;
pub use self::core::{
    load_units, AppliedMigration, DatabaseConn, MigrationReport, MigrationStatus, MigrationUnit,
    Migrator, Row, Rows, SchemaKind, SchemaLocator, SchemaManager, SchemaState, Statement,
    UnitStatus, Value, ValueKind, VERSION_TABLE,
};
pub use import::ImportDatabase;

use crate::error::{DatabaseError, Result};

/// Apply every pending migration in `migrations_path` to the database at `db_path`
pub fn migrate(db_path: impl AsRef<Path>, migrations_path: impl AsRef<Path>) -> Result<MigrationReport> {
    Migrator::new(db_path.as_ref()).migrate(migrations_path)
}

/// Drop everything in the database at `db_path`, version table included
pub fn reset(db_path: impl AsRef<Path>) -> Result<()> {
    Migrator::new(db_path.as_ref()).reset()
}

/// Open a connection the caller closes (or drops) itself
pub fn connect(path: impl AsRef<Path>) -> Result<DatabaseConn> {
    DatabaseConn::open(path)
}

/// Open a connection for the duration of `f`, closing it on every exit path
pub fn scoped<T, E, F>(path: impl AsRef<Path>, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&mut DatabaseConn) -> std::result::Result<T, E>,
    E: From<DatabaseError>,
{
    DatabaseConn::scoped(path, f)
}

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: impl AsRef<Path>) -> Result<()> {
    let dir = data_dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| DatabaseError::io(dir, e))
}
