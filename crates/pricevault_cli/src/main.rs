//! PriceVault command-line entry point.
//!
//! # Responsibility
//! - Wire `Settings`, connection bootstrap and the table repository together.
//! - Print results as JSON on stdout so output can be piped.

use clap::{Parser, Subcommand};
use pricevault_core::db::open_db_from_settings;
use pricevault_core::{
    config, core_version, default_log_level, init_logging, Bar, ConflictPolicy, Settings,
    SqliteTableRepository, TableRepository,
};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pricevault")]
#[command(about = "Store and read OHLCV bar tables in SQLite", long_about = None)]
struct Cli {
    /// Env file providing DB_NAME. Defaults to `.env` in the current directory.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Absolute directory for rotating log files. Logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version and resolved database name
    Info,
    /// Insert a JSON array of bars into a table
    Insert {
        table: String,
        /// Path to a JSON file containing an array of bars
        input: PathBuf,
        #[arg(long, default_value = "fail")]
        if_exists: ConflictPolicy,
    },
    /// Print a table newest-first as JSON
    Read {
        table: String,
        #[arg(long)]
        limit: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let env_file = cli.env_file.unwrap_or_else(config::default_env_file);
    let settings = Settings::load(&env_file)?;

    match cli.command {
        Commands::Info => {
            println!("pricevault_core version={}", core_version());
            println!("db_name={}", settings.db_name);
        }
        Commands::Insert {
            table,
            input,
            if_exists,
        } => {
            let raw = std::fs::read_to_string(&input)
                .map_err(|err| format!("failed to read `{}`: {err}", input.display()))?;
            let bars: Vec<Bar> = serde_json::from_str(&raw)?;

            let conn = open_db_from_settings(&settings)?;
            let repo = SqliteTableRepository::new(&conn);
            let outcome = repo.insert_table(&table, &bars, if_exists)?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Commands::Read { table, limit } => {
            let conn = open_db_from_settings(&settings)?;
            let repo = SqliteTableRepository::new(&conn);
            let bars = repo.read_table(&table, limit)?;
            println!("{}", serde_json::to_string_pretty(&bars)?);
        }
    }

    Ok(())
}
