//! Import pipeline database handle
//!
//! `ImportDatabase` opens one logical database file, brings its schema up to
//! date, and keeps the connection for the caller's read/write work.

use std::path::{Path, PathBuf};

use tracing::info;

use super::core::{
    DatabaseConn, MigrationReport, MigrationStatus, SchemaKind, SchemaLocator, SchemaManager,
};
use crate::error::Result;

/// An up-to-date logical database with its open connection
pub struct ImportDatabase {
    kind: SchemaKind,
    db: DatabaseConn,
    report: MigrationReport,
}

impl ImportDatabase {
    /// Open the database at `path` and apply the pending migrations for `kind`
    pub fn open(path: impl AsRef<Path>, kind: SchemaKind, locator: &SchemaLocator) -> Result<Self> {
        let db = DatabaseConn::open(path)?;
        let report = SchemaManager::new(&db).migrate(locator.path_for(kind))?;

        if !report.applied.is_empty() {
            info!(
                "Migrated {} at {}: applied {}",
                kind,
                db.path().display(),
                report.applied.join(", ")
            );
        }

        Ok(Self { kind, db, report })
    }

    /// Open the database for `kind` inside a data directory
    ///
    /// Uses the standard file path: `{data_dir}/{kind}.sqlite3`
    pub fn open_in_dir(
        data_dir: impl AsRef<Path>,
        kind: SchemaKind,
        locator: &SchemaLocator,
    ) -> Result<Self> {
        Self::open(Self::path_in_dir(data_dir, kind), kind, locator)
    }

    /// Standard database file path for `kind` inside `data_dir`
    pub fn path_in_dir(data_dir: impl AsRef<Path>, kind: SchemaKind) -> PathBuf {
        data_dir.as_ref().join(format!("{}.sqlite3", kind.name()))
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Migrations applied when this handle was opened
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    pub fn connection(&self) -> &DatabaseConn {
        &self.db
    }

    pub fn status(&self, locator: &SchemaLocator) -> Result<MigrationStatus> {
        SchemaManager::new(&self.db).status(locator.path_for(self.kind))
    }

    /// Close the connection, surfacing any close error
    pub fn close(mut self) -> Result<()> {
        self.db.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::SchemaState;
    use tempfile::tempdir;

    fn locator_with_units(root: &Path) -> SchemaLocator {
        let locator = SchemaLocator::new(root);
        let units = [
            (
                SchemaKind::IntermediateDb,
                "001_users.sql",
                "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, created_at TEXT);",
            ),
            (
                SchemaKind::MappingsDb,
                "001_ids.sql",
                "CREATE TABLE ids (original_id TEXT PRIMARY KEY, discourse_id INTEGER);",
            ),
            (
                SchemaKind::UploadsDb,
                "001_uploads.sql",
                "CREATE TABLE uploads (id TEXT PRIMARY KEY, upload BLOB, markdown TEXT);",
            ),
        ];
        for (kind, file, sql) in units {
            let dir = locator.path_for(kind);
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(dir.join(file), sql).unwrap();
        }
        locator
    }

    #[test]
    fn test_open_in_dir_migrates() {
        let root = tempdir().unwrap();
        let locator = locator_with_units(root.path());

        let db = ImportDatabase::open_in_dir(root.path(), SchemaKind::IntermediateDb, &locator)
            .unwrap();
        assert_eq!(db.kind(), SchemaKind::IntermediateDb);
        assert_eq!(db.report().applied, vec!["001"]);
        assert!(root.path().join("intermediate_db.sqlite3").exists());

        db.connection()
            .execute(
                "INSERT INTO users (username, created_at) VALUES (?1, ?2)",
                &["sam".into(), chrono::Utc::now().into()],
            )
            .unwrap();
        assert_eq!(db.connection().table_count("users").unwrap(), 1);
        assert_eq!(db.status(&locator).unwrap().state, SchemaState::UpToDate);
        db.close().unwrap();

        let reopened =
            ImportDatabase::open_in_dir(root.path(), SchemaKind::IntermediateDb, &locator)
                .unwrap();
        assert!(reopened.report().applied.is_empty());
        assert_eq!(reopened.report().already_applied, 1);
    }

    #[test]
    fn test_logical_databases_are_independent() {
        let root = tempdir().unwrap();
        let locator = locator_with_units(root.path());

        let mappings =
            ImportDatabase::open_in_dir(root.path(), SchemaKind::MappingsDb, &locator).unwrap();
        let uploads =
            ImportDatabase::open_in_dir(root.path(), SchemaKind::UploadsDb, &locator).unwrap();

        assert!(mappings.connection().table_exists("ids").unwrap());
        assert!(!mappings.connection().table_exists("uploads").unwrap());
        assert!(uploads.connection().table_exists("uploads").unwrap());
        assert!(!uploads.connection().table_exists("ids").unwrap());
        assert!(!ImportDatabase::path_in_dir(root.path(), SchemaKind::IntermediateDb).exists());
    }
}
