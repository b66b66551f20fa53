use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use importdb::database::{self, ensure_data_dir};
use importdb::{ImportConfig, SchemaKind};

use crate::db_path;

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// intermediate_db, mappings_db or uploads_db
    #[clap(value_name = "KIND", value_parser = super::parse_kind)]
    pub kind: SchemaKind,

    /// Database file to migrate instead of the configured one
    #[clap(long)]
    pub db: Option<PathBuf>,

    /// Migrations directory to use instead of the configured one
    #[clap(long)]
    pub migrations: Option<PathBuf>,
}

/// Arguments for the Reset command
#[derive(Args)]
pub struct ResetArgs {
    /// intermediate_db, mappings_db or uploads_db
    #[clap(value_name = "KIND", value_parser = super::parse_kind)]
    pub kind: SchemaKind,

    /// Database file to reset instead of the configured one
    #[clap(long)]
    pub db: Option<PathBuf>,

    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run_migrate(config: &ImportConfig, args: MigrateArgs) -> Result<()> {
    let path = db_path(config, args.kind, &args.db);
    if args.db.is_none() {
        ensure_data_dir(&config.data_dir)?;
    }
    let migrations = args
        .migrations
        .unwrap_or_else(|| config.locator().path_for(args.kind).to_path_buf());

    let report = database::migrate(&path, &migrations)?;

    if report.applied.is_empty() {
        println!(
            "{} is up to date ({} migrations applied)",
            path.display(),
            report.already_applied
        );
    } else {
        for version in &report.applied {
            println!("applied {}", version);
        }
        println!(
            "{}: {} applied now, {} previously",
            path.display(),
            report.applied.len(),
            report.already_applied
        );
    }
    Ok(())
}

pub fn run_reset(config: &ImportConfig, args: ResetArgs) -> Result<()> {
    let path = db_path(config, args.kind, &args.db);
    if !args.yes {
        return Err(anyhow!(
            "refusing to reset {} without --yes; this drops every table",
            path.display()
        ));
    }
    if !path.exists() {
        println!("{} does not exist, nothing to reset", path.display());
        return Ok(());
    }

    database::reset(&path)?;
    println!("reset {}", path.display());
    Ok(())
}
