use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use importdb::{ImportConfig, MigrationStatus, Migrator, SchemaKind};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::db_path;

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// intermediate_db, mappings_db or uploads_db
    #[clap(value_name = "KIND", value_parser = super::parse_kind)]
    pub kind: SchemaKind,

    /// Database file to inspect instead of the configured one
    #[clap(long)]
    pub db: Option<PathBuf>,

    /// Migrations directory to use instead of the configured one
    #[clap(long)]
    pub migrations: Option<PathBuf>,

    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct UnitRow {
    version: String,
    name: String,
    status: String,
    applied_at: String,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    kind: SchemaKind,
    path: String,
    #[serde(flatten)]
    status: &'a MigrationStatus,
}

pub fn run(config: &ImportConfig, args: StatusArgs) -> Result<()> {
    let path = db_path(config, args.kind, &args.db);
    let migrations = args
        .migrations
        .unwrap_or_else(|| config.locator().path_for(args.kind).to_path_buf());

    let status = Migrator::new(&path).status(&migrations)?;

    if args.json {
        let output = StatusOutput {
            kind: args.kind,
            path: path.display().to_string(),
            status: &status,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} ({}): {}", args.kind, path.display(), status.state);

    let rows: Vec<UnitRow> = status
        .units
        .iter()
        .map(|u| UnitRow {
            version: u.version.clone(),
            name: u.name.clone(),
            status: match (u.is_applied(), u.modified) {
                (true, true) => "applied (modified)".to_string(),
                (true, false) => "applied".to_string(),
                (false, _) => "pending".to_string(),
            },
            applied_at: u
                .applied_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        })
        .collect();

    if !rows.is_empty() {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    for version in &status.unknown_applied {
        println!("warning: {} is recorded as applied but has no migration file", version);
    }
    Ok(())
}
