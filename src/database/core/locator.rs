//! Logical database kinds and the directories holding their migrations

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{DatabaseError, Result};

/// The logical databases of the import pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    IntermediateDb,
    MappingsDb,
    UploadsDb,
}

impl SchemaKind {
    pub fn all() -> [SchemaKind; 3] {
        [
            SchemaKind::IntermediateDb,
            SchemaKind::MappingsDb,
            SchemaKind::UploadsDb,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::IntermediateDb => "intermediate_db",
            SchemaKind::MappingsDb => "mappings_db",
            SchemaKind::UploadsDb => "uploads_db",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SchemaKind::IntermediateDb => "Records converted from the source platform",
            SchemaKind::MappingsDb => "Source-to-target ID mappings",
            SchemaKind::UploadsDb => "Uploaded files and their processing state",
        }
    }

    fn index(&self) -> usize {
        match self {
            SchemaKind::IntermediateDb => 0,
            SchemaKind::MappingsDb => 1,
            SchemaKind::UploadsDb => 2,
        }
    }
}

impl FromStr for SchemaKind {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        SchemaKind::all()
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DatabaseError::UnknownSchemaKind {
                name: s.to_string(),
            })
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Immutable lookup from logical database to migrations directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocator {
    paths: [PathBuf; 3],
}

impl SchemaLocator {
    /// Standard layout: `<root>/db/<kind>_schema`
    pub fn new(root: impl AsRef<Path>) -> Self {
        let db_dir = root.as_ref().join("db");
        Self {
            paths: SchemaKind::all().map(|kind| db_dir.join(format!("{}_schema", kind.name()))),
        }
    }

    /// Return a locator with the directory for `kind` replaced
    pub fn with_path(mut self, kind: SchemaKind, dir: impl Into<PathBuf>) -> Self {
        self.paths[kind.index()] = dir.into();
        self
    }

    /// Resolve a logical database name, e.g. `"mappings_db"`
    pub fn resolve(&self, name: &str) -> Result<&Path> {
        let kind: SchemaKind = name.parse()?;
        Ok(self.path_for(kind))
    }

    pub fn path_for(&self, kind: SchemaKind) -> &Path {
        &self.paths[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaKind, &Path)> {
        SchemaKind::all()
            .into_iter()
            .map(|kind| (kind, self.path_for(kind)))
    }
}
