use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::database::{ImportDatabase, Migrator, SchemaKind, SchemaLocator, SchemaState};

pub struct ImportConfig {
    /// Path to the directory holding the database files
    pub data_dir: String,

    /// Root of the migrations tree; schemas live under `<schema_root>/db/<kind>_schema`
    pub schema_root: String,
}

const EMPTY_CONFIG: &str = r#"### importdb configuration file

### directory holding intermediate_db, mappings_db and uploads_db files
# data_dir = "~/.importdb"

### root of the migrations tree (contains db/<kind>_schema directories)
# schema_root = "."
"#;

impl Default for ImportConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.importdb", home_dir),
            schema_root: ".".to_string(),
        }
    }
}

impl ImportConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<ImportConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.importdb/importdb.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        let importdb_dir = format!("{}/.importdb", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(importdb_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create importdb directory: {}", e))?;
                let p = format!("{}/importdb.toml", importdb_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of IMPORTDB)
        // E.g., `IMPORTDB_DATA_DIR=/data ./importdb migrate mappings_db` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("IMPORTDB"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let data_dir = match config.get("data_dir") {
            Some(p) => p.trim_end_matches('/').to_string(),
            None => importdb_dir,
        };

        let schema_root = config
            .get("schema_root")
            .cloned()
            .unwrap_or_else(|| ".".to_string());

        Ok(ImportConfig {
            data_dir,
            schema_root,
        })
    }

    /// Get the path to the database file of a logical database
    pub fn db_path(&self, kind: SchemaKind) -> PathBuf {
        ImportDatabase::path_in_dir(&self.data_dir, kind)
    }

    /// Build the schema locator for the configured migrations tree
    pub fn locator(&self) -> SchemaLocator {
        SchemaLocator::new(&self.schema_root)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let locator = self.locator();
        let mut lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("Schema Root:        {}", self.schema_root),
        ];

        for kind in SchemaKind::all() {
            lines.push(format!(
                "{:<20}{} (migrations: {})",
                format!("{}:", kind),
                self.db_path(kind).display(),
                locator.path_for(kind).display()
            ));
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.importdb/importdb.toml", home_dir)
    }
}

/// Information about one logical database file
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseFileInfo {
    pub kind: SchemaKind,
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SchemaState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_count: Option<usize>,
}

/// Get database file information without creating missing files
pub fn get_database_info(config: &ImportConfig, kind: SchemaKind) -> DatabaseFileInfo {
    let path = config.db_path(kind);
    let exists = path.exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let status = if exists {
        Migrator::new(&path)
            .status(config.locator().path_for(kind))
            .ok()
    } else {
        None
    };

    DatabaseFileInfo {
        kind,
        path: path.display().to_string(),
        exists,
        size_bytes,
        state: status.as_ref().map(|s| s.state),
        applied_count: status
            .as_ref()
            .map(|s| s.units.iter().filter(|u| u.is_applied()).count()),
        pending_count: status.as_ref().map(|s| s.pending().count()),
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ImportConfig::default();
        assert!(config.data_dir.ends_with("/.importdb"));
        assert_eq!(config.schema_root, ".");
    }

    #[test]
    fn test_paths() {
        let config = ImportConfig {
            data_dir: "/test/dir".to_string(),
            schema_root: "/srv/import".to_string(),
        };

        assert_eq!(
            config.db_path(SchemaKind::MappingsDb),
            PathBuf::from("/test/dir/mappings_db.sqlite3")
        );
        assert_eq!(
            config.locator().path_for(SchemaKind::UploadsDb),
            Path::new("/srv/import/db/uploads_db_schema")
        );
        assert!(config.summary().contains("/test/dir/intermediate_db.sqlite3"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("importdb.toml");
        std::fs::write(
            &file,
            "data_dir = \"/var/lib/importdb/\"\nschema_root = \"/opt/import\"\n",
        )
        .unwrap();

        let config = ImportConfig::new(&Some(file.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.data_dir, "/var/lib/importdb");
        assert_eq!(config.schema_root, "/opt/import");
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("fresh.toml");
        ImportConfig::new(&Some(file.to_string_lossy().to_string())).unwrap();
        let written = std::fs::read_to_string(&file).unwrap();
        assert!(written.starts_with("### importdb configuration file"));
    }

    #[test]
    fn test_database_info() {
        let dir = tempdir().unwrap();
        let config = ImportConfig {
            data_dir: dir.path().to_string_lossy().to_string(),
            schema_root: dir.path().to_string_lossy().to_string(),
        };

        let info = get_database_info(&config, SchemaKind::IntermediateDb);
        assert!(!info.exists);
        assert!(info.state.is_none());
        assert!(!config.db_path(SchemaKind::IntermediateDb).exists());

        let migrations = config.locator().path_for(SchemaKind::IntermediateDb).to_path_buf();
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("001_init.sql"), "CREATE TABLE t (id INTEGER);").unwrap();
        std::fs::write(migrations.join("002_more.sql"), "CREATE TABLE u (id INTEGER);").unwrap();
        crate::database::migrate(config.db_path(SchemaKind::IntermediateDb), &migrations).unwrap();

        let info = get_database_info(&config, SchemaKind::IntermediateDb);
        assert!(info.exists);
        assert!(info.size_bytes.is_some());
        assert_eq!(info.state, Some(SchemaState::UpToDate));
        assert_eq!(info.applied_count, Some(2));
        assert_eq!(info.pending_count, Some(0));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }
}
