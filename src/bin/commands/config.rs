use anyhow::Result;
use clap::Args;
use importdb::{format_size, get_database_info, DatabaseFileInfo, ImportConfig, SchemaKind};
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    schema_root: String,
    databases: Vec<DatabaseFileInfo>,
}

pub fn run(config: &ImportConfig, args: ConfigArgs) -> Result<()> {
    let databases: Vec<DatabaseFileInfo> = SchemaKind::all()
        .into_iter()
        .map(|kind| get_database_info(config, kind))
        .collect();

    if args.json {
        let info = ConfigInfo {
            config_file: ImportConfig::config_file_path(),
            data_dir: config.data_dir.clone(),
            schema_root: config.schema_root.clone(),
            databases,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Config File:        {}", ImportConfig::config_file_path());
    println!("{}", config.summary());
    println!();
    println!("Databases:");
    for db in &databases {
        let detail = match (db.exists, db.state) {
            (false, _) => "not created".to_string(),
            (true, Some(state)) => format!(
                "{}, {} applied, {} pending, {}",
                state,
                db.applied_count.unwrap_or(0),
                db.pending_count.unwrap_or(0),
                format_size(db.size_bytes.unwrap_or(0))
            ),
            (true, None) => "exists (migrations directory unreadable)".to_string(),
        };
        println!("  {:18} {}", format!("{}:", db.kind), detail);
    }
    Ok(())
}
