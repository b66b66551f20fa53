//! Core database infrastructure
//!
//! This module provides the foundational database components:
//! - `codec`: conversion between host values and SQLite storage classes
//! - `DatabaseConn`: SQLite connection wrapper with scoped release
//! - `SchemaLocator`: logical database name to migrations directory
//! - `Migrator` / `SchemaManager`: versioned, transactional migrations

pub mod codec;
mod connection;
mod locator;
mod migrator;

pub use codec::{Value, ValueKind};
pub use connection::{DatabaseConn, Row, Rows, Statement};
pub use locator::{SchemaKind, SchemaLocator};
pub use migrator::{
    load_units, AppliedMigration, MigrationReport, MigrationStatus, MigrationUnit, Migrator,
    SchemaManager, SchemaState, UnitStatus, VERSION_TABLE,
};
