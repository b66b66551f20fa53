//! Versioned schema migrations
//!
//! Each logical database has a directory of `*.sql` migration units named
//! `<version>_<name>.sql`. Applied units are recorded in the
//! `schema_migrations` table of the database they were applied to:
//!
//! ```text
//! schema_migrations
//! ├── version     TEXT PRIMARY KEY   -- "001"
//! ├── name        TEXT NOT NULL      -- "init"
//! ├── applied_at  TEXT NOT NULL      -- "2024-08-29T14:02:26Z"
//! └── checksum    TEXT NOT NULL      -- sha256 of the script
//! ```
//!
//! Units are applied in ascending version order, each inside its own
//! transaction together with its record, so a failed unit leaves neither its
//! schema changes nor its record behind.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::codec::Value;
use super::connection::{quote_identifier, DatabaseConn};
use crate::error::{DatabaseError, Result};

/// Name of the version-tracking table
pub const VERSION_TABLE: &str = "schema_migrations";

const VERSION_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        checksum TEXT NOT NULL
    );
"#;

/// One migration script read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub version: String,
    pub name: String,
    pub path: PathBuf,
    pub sql: String,
    pub checksum: String,
}

impl MigrationUnit {
    /// Read a unit from a `<version>_<name>.sql` file
    ///
    /// A file stem without `_` is both the version and the name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
            DatabaseError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "migration file name is not valid UTF-8",
                ),
            )
        })?;
        let (version, name) = stem.split_once('_').unwrap_or((stem, stem));
        let sql = std::fs::read_to_string(path).map_err(|e| DatabaseError::io(path, e))?;

        Ok(MigrationUnit {
            version: version.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
            checksum: checksum(&sql),
            sql,
        })
    }
}

fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// List the migration units in `migrations_path`, ascending by version
///
/// Files without a `.sql` extension are ignored. Two units sharing a version
/// key are rejected.
pub fn load_units(migrations_path: impl AsRef<Path>) -> Result<Vec<MigrationUnit>> {
    let dir = migrations_path.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| DatabaseError::io(dir, e))?;

    let mut units = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DatabaseError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            units.push(MigrationUnit::from_file(&path)?);
        }
    }

    units.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));

    if let Some(pair) = units.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(DatabaseError::DuplicateMigrationVersion {
            version: pair[0].version.clone(),
            first: pair[0].path.display().to_string(),
            second: pair[1].path.display().to_string(),
        });
    }

    Ok(units)
}

/// A row of the version-tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: String,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: String,
}

/// Migration state of a database file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    /// No version-tracking table
    Uninitialized,
    /// Version table exists but some units are still pending
    PartiallyMigrated,
    /// Every known unit is applied
    UpToDate,
}

impl std::fmt::Display for SchemaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaState::Uninitialized => write!(f, "uninitialized"),
            SchemaState::PartiallyMigrated => write!(f, "partially migrated"),
            SchemaState::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Outcome of a successful `migrate` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub version_table_created: bool,
    pub already_applied: usize,
    /// Versions applied by this run, in order
    pub applied: Vec<String>,
}

/// Applied/pending state of a single unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub version: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    /// The script changed since it was applied
    pub modified: bool,
}

impl UnitStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Full migration status of one database file against one migrations directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub state: SchemaState,
    pub units: Vec<UnitStatus>,
    /// Versions recorded as applied that have no file on disk
    pub unknown_applied: Vec<String>,
}

impl MigrationStatus {
    pub fn pending(&self) -> impl Iterator<Item = &UnitStatus> {
        self.units.iter().filter(|u| !u.is_applied())
    }

    pub fn modified(&self) -> impl Iterator<Item = &UnitStatus> {
        self.units.iter().filter(|u| u.modified)
    }
}

/// Schema manager bound to an open connection
///
/// Handles version tracking, migrations and resets for one database.
pub struct SchemaManager<'a> {
    db: &'a DatabaseConn,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(db: &'a DatabaseConn) -> Self {
        Self { db }
    }

    /// Create the version-tracking table; returns whether it was missing
    pub fn ensure_version_table(&self) -> Result<bool> {
        if self.db.table_exists(VERSION_TABLE)? {
            return Ok(false);
        }
        self.db.execute_batch(VERSION_TABLE_SQL)?;
        info!("Created {} in {}", VERSION_TABLE, self.db.path().display());
        Ok(true)
    }

    /// Every applied-version record, ascending by version
    pub fn applied(&self) -> Result<Vec<AppliedMigration>> {
        if !self.db.table_exists(VERSION_TABLE)? {
            return Ok(Vec::new());
        }

        self.db.query(
            "SELECT version, name, applied_at, checksum FROM schema_migrations ORDER BY version",
            &[],
            |rows| {
                rows.map(|row| -> Result<AppliedMigration> {
                    let row = row?;
                    let applied_at = row.datetime("applied_at")?.ok_or_else(|| {
                        DatabaseError::codec("timestamp", "applied_at is empty")
                    })?;
                    Ok(AppliedMigration {
                        version: row.text("version").unwrap_or_default().to_string(),
                        name: row.text("name").unwrap_or_default().to_string(),
                        applied_at,
                        checksum: row.text("checksum").unwrap_or_default().to_string(),
                    })
                })
                .collect()
            },
        )
    }

    /// Apply every pending unit in `migrations_path`
    pub fn migrate(&self, migrations_path: impl AsRef<Path>) -> Result<MigrationReport> {
        let units = load_units(migrations_path)?;
        self.apply_pending(&units)
    }

    /// Apply the units of `units` not yet recorded, in ascending order
    ///
    /// Stops at the first failing unit with [`DatabaseError::Migration`]; units
    /// before it stay applied, it and the ones after stay pending.
    pub fn apply_pending(&self, units: &[MigrationUnit]) -> Result<MigrationReport> {
        let version_table_created = self.ensure_version_table()?;
        let applied: BTreeSet<String> = self.applied()?.into_iter().map(|m| m.version).collect();

        let pending: Vec<&MigrationUnit> = units
            .iter()
            .filter(|u| !applied.contains(&u.version))
            .collect();

        if let (Some(first), Some(latest)) = (pending.first(), applied.last()) {
            if first.version < *latest {
                return Err(DatabaseError::OutOfOrderMigration {
                    version: first.version.clone(),
                    applied: latest.clone(),
                });
            }
        }

        for version in applied.iter().filter(|v| !units.iter().any(|u| &u.version == *v)) {
            warn!("Applied migration {} has no matching file", version);
        }

        let mut report = MigrationReport {
            version_table_created,
            already_applied: units.len() - pending.len(),
            applied: Vec::with_capacity(pending.len()),
        };

        for unit in pending {
            self.apply(unit)?;
            report.applied.push(unit.version.clone());
        }

        if report.applied.is_empty() {
            debug!("{} is up to date", self.db.path().display());
        }
        Ok(report)
    }

    fn apply(&self, unit: &MigrationUnit) -> Result<()> {
        let applied_at = Value::Timestamp(Utc::now());

        self.db
            .transaction(|tx| -> Result<usize> {
                tx.execute_batch(&unit.sql)?;
                tx.execute_named(
                    "INSERT INTO schema_migrations (version, name, applied_at, checksum)
                     VALUES (:version, :name, :applied_at, :checksum)",
                    &[
                        (":version", unit.version.as_str().into()),
                        (":name", unit.name.as_str().into()),
                        (":applied_at", applied_at),
                        (":checksum", unit.checksum.as_str().into()),
                    ],
                )
            })
            .map_err(|source| DatabaseError::Migration {
                version: unit.version.clone(),
                name: unit.name.clone(),
                source: Box::new(source),
            })?;

        info!(
            "Applied migration {} ({}) to {}",
            unit.version,
            unit.name,
            self.db.path().display()
        );
        Ok(())
    }

    /// Compare the database against the units in `migrations_path`
    pub fn status(&self, migrations_path: impl AsRef<Path>) -> Result<MigrationStatus> {
        let units = load_units(migrations_path)?;
        let initialized = self.db.table_exists(VERSION_TABLE)?;
        let mut applied: BTreeMap<String, AppliedMigration> = self
            .applied()?
            .into_iter()
            .map(|m| (m.version.clone(), m))
            .collect();

        let statuses: Vec<UnitStatus> = units
            .iter()
            .map(|unit| {
                let record = applied.remove(&unit.version);
                UnitStatus {
                    version: unit.version.clone(),
                    name: unit.name.clone(),
                    modified: record
                        .as_ref()
                        .is_some_and(|r| r.checksum != unit.checksum),
                    applied_at: record.map(|r| r.applied_at),
                }
            })
            .collect();

        let state = if !initialized {
            SchemaState::Uninitialized
        } else if statuses.iter().all(UnitStatus::is_applied) {
            SchemaState::UpToDate
        } else {
            SchemaState::PartiallyMigrated
        };

        Ok(MigrationStatus {
            state,
            units: statuses,
            unknown_applied: applied.into_keys().collect(),
        })
    }

    /// Drop every view, trigger, index and table, including the version table
    pub fn reset(&self) -> Result<()> {
        let objects: Vec<(String, String)> = self.db.query(
            r"SELECT type, name FROM sqlite_master
              WHERE name NOT LIKE 'sqlite\_%' ESCAPE '\'
              ORDER BY CASE type WHEN 'view' THEN 0 WHEN 'trigger' THEN 1 WHEN 'index' THEN 2 ELSE 3 END",
            &[],
            |rows| {
                rows.map(|row| -> Result<(String, String)> {
                    let row = row?;
                    Ok((
                        row.text("type").unwrap_or_default().to_uppercase(),
                        row.text("name").unwrap_or_default().to_string(),
                    ))
                })
                .collect()
            },
        )?;

        // Tables referencing each other must be droppable in any order
        self.db.execute_batch("PRAGMA foreign_keys=OFF")?;
        let dropped = self.db.transaction(|tx| -> Result<()> {
            for (kind, name) in &objects {
                tx.execute_batch(&format!("DROP {} IF EXISTS {}", kind, quote_identifier(name)))?;
            }
            Ok(())
        });
        self.db.execute_batch("PRAGMA foreign_keys=ON")?;
        dropped?;

        self.db.execute_batch("VACUUM")?;
        info!(
            "Reset {} ({} schema objects dropped)",
            self.db.path().display(),
            objects.len()
        );
        Ok(())
    }
}

/// Path-based migrator: opens its own connection for every operation
#[derive(Debug, Clone)]
pub struct Migrator {
    db_path: PathBuf,
}

impl Migrator {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Bring the database up to date with `migrations_path`
    pub fn migrate(&self, migrations_path: impl AsRef<Path>) -> Result<MigrationReport> {
        DatabaseConn::scoped(&self.db_path, |db| {
            SchemaManager::new(db).migrate(migrations_path)
        })
    }

    /// Return the database file to its empty, uninitialized state
    pub fn reset(&self) -> Result<()> {
        DatabaseConn::scoped(&self.db_path, |db| SchemaManager::new(db).reset())
    }

    /// Migration status; a missing database file is reported as uninitialized
    /// without being created
    pub fn status(&self, migrations_path: impl AsRef<Path>) -> Result<MigrationStatus> {
        if !self.db_path.exists() {
            let units = load_units(migrations_path)?;
            return Ok(MigrationStatus {
                state: SchemaState::Uninitialized,
                units: units
                    .into_iter()
                    .map(|unit| UnitStatus {
                        version: unit.version,
                        name: unit.name,
                        applied_at: None,
                        modified: false,
                    })
                    .collect(),
                unknown_applied: Vec::new(),
            });
        }

        DatabaseConn::scoped(&self.db_path, |db| {
            SchemaManager::new(db).status(migrations_path)
        })
    }

    pub fn state(&self, migrations_path: impl AsRef<Path>) -> Result<SchemaState> {
        self.status(migrations_path).map(|s| s.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::locator::SchemaLocator;
    use tempfile::{tempdir, TempDir};

    fn write_units(dir: &Path, units: &[(&str, &str)]) {
        std::fs::create_dir_all(dir).unwrap();
        for (file, sql) in units {
            std::fs::write(dir.join(file), sql).unwrap();
        }
    }

    fn mappings_units() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "001_init.sql",
                "CREATE TABLE users (original_id TEXT NOT NULL PRIMARY KEY, discourse_id INTEGER NOT NULL);",
            ),
            (
                "002_add_index.sql",
                "CREATE UNIQUE INDEX users_discourse_id ON users (discourse_id);",
            ),
            (
                "003_add_column.sql",
                "ALTER TABLE users ADD COLUMN created_at TEXT;",
            ),
        ]
    }

    /// Schema root holding the three mappings units, plus a database path inside it
    fn mappings_fixture() -> (TempDir, SchemaLocator, PathBuf) {
        let root = tempdir().unwrap();
        let locator = SchemaLocator::new(root.path());
        write_units(
            locator.resolve("mappings_db").unwrap(),
            &mappings_units(),
        );
        let db_path = root.path().join("mappings.db");
        (root, locator, db_path)
    }

    fn versions(db_path: &Path) -> Vec<String> {
        let db = DatabaseConn::open(db_path).unwrap();
        SchemaManager::new(&db)
            .applied()
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect()
    }

    fn schema_of(db_path: &Path) -> Vec<(String, String, String)> {
        let db = DatabaseConn::open(db_path).unwrap();
        db.query_all(
            "SELECT type, name, sql FROM sqlite_master
             WHERE name NOT LIKE 'sqlite%' AND name != 'schema_migrations' ORDER BY name",
            &[],
        )
        .unwrap()
        .into_iter()
        .map(|r| {
            (
                r.text("type").unwrap().to_string(),
                r.text("name").unwrap().to_string(),
                r.text("sql").unwrap_or_default().to_string(),
            )
        })
        .collect()
    }

    #[test]
    fn test_unit_from_file() {
        let dir = tempdir().unwrap();
        write_units(dir.path(), &[("20240829140226_drop_old_columns.sql", "SELECT 1;")]);
        let unit = MigrationUnit::from_file(dir.path().join("20240829140226_drop_old_columns.sql"))
            .unwrap();
        assert_eq!(unit.version, "20240829140226");
        assert_eq!(unit.name, "drop_old_columns");
        assert_eq!(unit.sql, "SELECT 1;");
        assert_eq!(unit.checksum.len(), 64);
    }

    #[test]
    fn test_load_units_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        write_units(
            dir.path(),
            &[
                ("010_later.sql", "SELECT 1;"),
                ("002_second.sql", "SELECT 1;"),
                ("001_first.sql", "SELECT 1;"),
                ("README.md", "not a migration"),
            ],
        );
        let versions: Vec<String> = load_units(dir.path())
            .unwrap()
            .into_iter()
            .map(|u| u.version)
            .collect();
        assert_eq!(versions, vec!["001", "002", "010"]);
    }

    #[test]
    fn test_load_units_rejects_duplicate_versions() {
        let dir = tempdir().unwrap();
        write_units(
            dir.path(),
            &[("001_a.sql", "SELECT 1;"), ("001_b.sql", "SELECT 2;")],
        );
        let err = load_units(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::DuplicateMigrationVersion { ref version, .. } if version == "001"
        ));
    }

    #[test]
    fn test_load_units_missing_directory() {
        let dir = tempdir().unwrap();
        let err = load_units(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DatabaseError::Io { .. }));
    }

    #[test]
    fn test_fresh_database_is_uninitialized() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrator = Migrator::new(&db_path);
        let status = migrator.status(locator.resolve("mappings_db").unwrap()).unwrap();
        assert_eq!(status.state, SchemaState::Uninitialized);
        assert_eq!(status.pending().count(), 3);
        assert!(!db_path.exists());
    }

    #[test]
    fn test_status_of_missing_file_matches_empty_database() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let missing = Migrator::new(&db_path).status(migrations).unwrap();
        assert!(!db_path.exists());

        DatabaseConn::scoped(&db_path, |_| Ok::<_, DatabaseError>(())).unwrap();
        let empty = Migrator::new(&db_path).status(migrations).unwrap();
        assert_eq!(missing, empty);

        let typo = db_path.with_file_name("typo.db");
        let err = Migrator::new(&typo).status(migrations.join("nope")).unwrap_err();
        assert!(matches!(err, DatabaseError::Io { .. }));
        assert!(!typo.exists());
    }

    #[test]
    fn test_migrate_mappings_scenario() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let migrator = Migrator::new(&db_path);

        let report = migrator.migrate(migrations).unwrap();
        assert!(report.version_table_created);
        assert_eq!(report.already_applied, 0);
        assert_eq!(report.applied, vec!["001", "002", "003"]);

        assert_eq!(versions(&db_path), vec!["001", "002", "003"]);
        assert_eq!(migrator.state(migrations).unwrap(), SchemaState::UpToDate);

        let db = DatabaseConn::open(&db_path).unwrap();
        db.execute(
            "INSERT INTO users (original_id, discourse_id, created_at) VALUES ('u1', 1, NULL)",
            &[],
        )
        .unwrap();
    }

    #[test]
    fn test_migrate_twice_is_noop() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let migrator = Migrator::new(&db_path);
        migrator.migrate(migrations).unwrap();
        let first = DatabaseConn::scoped(&db_path, |db| SchemaManager::new(db).applied()).unwrap();

        let report = migrator.migrate(migrations).unwrap();
        assert!(!report.version_table_created);
        assert_eq!(report.already_applied, 3);
        assert!(report.applied.is_empty());

        let second = DatabaseConn::scoped(&db_path, |db| SchemaManager::new(db).applied()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_unit_is_not_recorded_and_resumes() {
        let root = tempdir().unwrap();
        let migrations = root.path().join("schema");
        write_units(
            &migrations,
            &[
                ("001_init.sql", "CREATE TABLE topics (id INTEGER PRIMARY KEY);"),
                ("002_posts.sql", "CREATE TABLE posts (id INTEGER PRIMARY KEY);"),
                (
                    "003_broken.sql",
                    "CREATE TABLE half_done (id INTEGER); INSERT INTO no_such_table VALUES (1);",
                ),
                ("004_tags.sql", "CREATE TABLE tags (id INTEGER PRIMARY KEY);"),
            ],
        );
        let db_path = root.path().join("intermediate.db");
        let migrator = Migrator::new(&db_path);

        let err = migrator.migrate(&migrations).unwrap_err();
        match err {
            DatabaseError::Migration { version, name, source } => {
                assert_eq!(version, "003");
                assert_eq!(name, "broken");
                assert!(matches!(*source, DatabaseError::Statement { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(versions(&db_path), vec!["001", "002"]);
        assert_eq!(
            migrator.state(&migrations).unwrap(),
            SchemaState::PartiallyMigrated
        );
        {
            let db = DatabaseConn::open(&db_path).unwrap();
            assert!(!db.table_exists("half_done").unwrap());
            assert!(!db.table_exists("tags").unwrap());
        }

        write_units(
            &migrations,
            &[("003_broken.sql", "CREATE TABLE half_done (id INTEGER);")],
        );
        let report = migrator.migrate(&migrations).unwrap();
        assert_eq!(report.already_applied, 2);
        assert_eq!(report.applied, vec!["003", "004"]);
        assert_eq!(versions(&db_path), vec!["001", "002", "003", "004"]);
    }

    #[test]
    fn test_out_of_order_unit_is_rejected() {
        let root = tempdir().unwrap();
        let migrations = root.path().join("schema");
        write_units(
            &migrations,
            &[
                ("001_init.sql", "CREATE TABLE a (id INTEGER);"),
                ("003_third.sql", "CREATE TABLE c (id INTEGER);"),
            ],
        );
        let db_path = root.path().join("uploads.db");
        let migrator = Migrator::new(&db_path);
        migrator.migrate(&migrations).unwrap();

        write_units(&migrations, &[("002_second.sql", "CREATE TABLE b (id INTEGER);")]);
        let err = migrator.migrate(&migrations).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::OutOfOrderMigration { ref version, ref applied }
                if version == "002" && applied == "003"
        ));
        assert_eq!(versions(&db_path), vec!["001", "003"]);
    }

    #[test]
    fn test_status_reports_modified_and_unknown() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let migrator = Migrator::new(&db_path);
        migrator.migrate(migrations).unwrap();

        write_units(
            migrations,
            &[("002_add_index.sql", "CREATE INDEX users_discourse_id ON users (discourse_id);")],
        );
        std::fs::remove_file(migrations.join("003_add_column.sql")).unwrap();

        let status = migrator.status(migrations).unwrap();
        assert_eq!(status.state, SchemaState::UpToDate);
        let modified: Vec<&str> = status.modified().map(|u| u.version.as_str()).collect();
        assert_eq!(modified, vec!["002"]);
        assert_eq!(status.unknown_applied, vec!["003"]);
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let (_root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let migrator = Migrator::new(&db_path);
        migrator.migrate(migrations).unwrap();

        migrator.reset().unwrap();
        assert_eq!(
            migrator.state(migrations).unwrap(),
            SchemaState::Uninitialized
        );
        assert!(schema_of(&db_path).is_empty());
        assert!(versions(&db_path).is_empty());
    }

    #[test]
    fn test_reset_then_migrate_matches_fresh_migrate() {
        let (root, locator, db_path) = mappings_fixture();
        let migrations = locator.resolve("mappings_db").unwrap();
        let migrator = Migrator::new(&db_path);
        migrator.migrate(migrations).unwrap();
        DatabaseConn::scoped(&db_path, |db| {
            db.execute("INSERT INTO users VALUES ('u1', 1, NULL)", &[])
        })
        .unwrap();

        migrator.reset().unwrap();
        migrator.migrate(migrations).unwrap();

        let fresh_path = root.path().join("fresh.db");
        Migrator::new(&fresh_path).migrate(migrations).unwrap();

        assert_eq!(schema_of(&db_path), schema_of(&fresh_path));
        assert_eq!(versions(&db_path), versions(&fresh_path));
        let db = DatabaseConn::open(&db_path).unwrap();
        assert_eq!(db.table_count("users").unwrap(), 0);
    }

    #[test]
    fn test_reset_handles_foreign_keys_and_views() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("intermediate.db");
        DatabaseConn::scoped(&db_path, |db| {
            db.execute_batch(
                r#"CREATE TABLE "odd ""name""" (id INTEGER PRIMARY KEY);
                   CREATE TABLE parent (id INTEGER PRIMARY KEY);
                   CREATE TABLE child (id INTEGER, parent_id INTEGER REFERENCES parent(id));
                   INSERT INTO parent VALUES (1);
                   INSERT INTO child VALUES (1, 1);
                   CREATE VIEW child_view AS SELECT * FROM child;
                   CREATE TRIGGER child_ins AFTER INSERT ON child BEGIN SELECT 1; END;"#,
            )
        })
        .unwrap();

        Migrator::new(&db_path).reset().unwrap();
        assert!(schema_of(&db_path).is_empty());
    }
}
