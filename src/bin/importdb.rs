use std::path::PathBuf;

use clap::{Parser, Subcommand};
use importdb::{ImportConfig, SchemaKind};
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::migrate::{MigrateArgs, ResetArgs};
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.importdb/importdb.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations to a logical database
    Migrate(MigrateArgs),

    /// Drop every schema object of a logical database
    Reset(ResetArgs),

    /// Show applied and pending migrations of a logical database
    Status(StatusArgs),

    /// Print the migrations directory of a logical database
    Path {
        /// intermediate_db, mappings_db or uploads_db
        #[clap(value_name = "KIND", value_parser = commands::parse_kind)]
        kind: SchemaKind,
    },

    /// Show the configuration and database files
    Config(ConfigArgs),
}

/// Database path override shared by subcommands
pub(crate) fn db_path(config: &ImportConfig, kind: SchemaKind, over: &Option<PathBuf>) -> PathBuf {
    over.clone().unwrap_or_else(|| config.db_path(kind))
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match ImportConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::run_migrate(&config, args),
        Commands::Reset(args) => commands::migrate::run_reset(&config, args),
        Commands::Status(args) => commands::status::run(&config, args),
        Commands::Path { kind } => {
            println!("{}", config.locator().path_for(kind).display());
            Ok(())
        }
        Commands::Config(args) => commands::config::run(&config, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
