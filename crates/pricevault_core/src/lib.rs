//! Core persistence logic for PriceVault.
//! Stores OHLCV bar datasets as named SQLite tables and reads them back
//! newest-first.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{env_file_path, Settings, SettingsError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::bar::{Bar, BarTime, BarValidationError};
pub use repo::table_name::TableName;
pub use repo::table_repo::{
    ConflictPolicy, InsertOutcome, RepoError, RepoResult, SqliteTableRepository, TableRepository,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
