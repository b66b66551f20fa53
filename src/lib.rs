#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! importdb - SQLite migration and connection layer for a data-import pipeline
//!
//! An import run works against three independent SQLite files:
//!
//! | Logical database  | Holds                                        |
//! |-------------------|----------------------------------------------|
//! | `intermediate_db` | records converted from the source platform   |
//! | `mappings_db`     | source-to-target ID mappings                 |
//! | `uploads_db`      | uploaded files and their processing state    |
//!
//! Each has its own directory of ordered `*.sql` migration units. This crate
//! creates and evolves those files and gives callers type-safe connections
//! to them.
//!
//! # Feature Flags
//!
//! | Feature   | Description                           | Key Dependencies              |
//! |-----------|---------------------------------------|-------------------------------|
//! | `display` | Table formatting with `tabled`        | `tabled`                      |
//! | `cli`     | The `importdb` binary                 | `clap`, `tracing-subscriber`  |
//!
//! ```toml
//! # Library only
//! importdb = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: all database functionality
//!   - `core::codec`: host values <-> SQLite storage classes
//!   - `core`: `DatabaseConn`, `SchemaLocator`, `Migrator`
//!   - `import`: `ImportDatabase`, an up-to-date logical database
//! - **[`config`]**: configuration for the surrounding tool
//! - **[`error`]**: `DatabaseError` and the crate `Result`
//!
//! # Quick Start
//!
//! ## Migrating
//!
//! ```rust,ignore
//! use importdb::{database, SchemaLocator};
//!
//! let locator = SchemaLocator::new("/srv/import");
//! let report = database::migrate("/data/mappings_db.sqlite3", locator.resolve("mappings_db")?)?;
//! println!("applied: {:?}", report.applied);
//! ```
//!
//! ## Reading and writing
//!
//! ```rust,ignore
//! use importdb::{database, Value};
//!
//! database::scoped("/data/intermediate_db.sqlite3", |db| {
//!     db.execute(
//!         "INSERT INTO users (id, username, created_at, ip_address) VALUES (?1, ?2, ?3, ?4)",
//!         &[7.into(), "sam".into(), chrono::Utc::now().into(), Value::IpAddress(raw_ip)],
//!     )?;
//!
//!     db.query("SELECT * FROM users", &[], |rows| {
//!         for row in rows {
//!             let row = row?;
//!             println!("{:?} {:?}", row.text("username"), row.datetime("created_at")?);
//!         }
//!         Ok(())
//!     })
//! })?;
//! ```

pub mod config;
pub mod database;
pub mod error;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, get_database_info, DatabaseFileInfo, ImportConfig};

// =============================================================================
// Errors
// =============================================================================

pub use error::{DatabaseError, Result};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Connections and values
pub use database::{DatabaseConn, Row, Rows, Statement, Value, ValueKind};

// Schema location and migrations
pub use database::{
    AppliedMigration, MigrationReport, MigrationStatus, MigrationUnit, Migrator, SchemaKind,
    SchemaLocator, SchemaManager, SchemaState, UnitStatus,
};

// Logical database handle
pub use database::ImportDatabase;
