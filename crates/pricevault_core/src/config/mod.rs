//! Application settings loaded from an env file.
//!
//! # Responsibility
//! - Resolve the env file location to an absolute path.
//! - Build an immutable `Settings` value once at startup.
//!
//! # Invariants
//! - Process environment variables take precedence over env-file entries.
//! - Keys match case-insensitively (`DB_NAME`, `db_name`).
//! - A missing env file is not an error when the environment supplies
//!   every required value.
//! - There is no global settings instance; callers pass `&Settings`.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default env file name, resolved against a base directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

const DB_NAME_KEY: &str = "DB_NAME";

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug)]
pub enum SettingsError {
    /// The env file exists but could not be read or parsed.
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    /// No source provided a value for the key.
    Missing(&'static str),
    Invalid {
        key: &'static str,
        message: String,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvFile { path, source } => {
                write!(f, "failed to read env file `{}`: {source}", path.display())
            }
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::Invalid { key, message } => write!(f, "invalid setting `{key}`: {message}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EnvFile { source, .. } => Some(source),
            Self::Missing(_) | Self::Invalid { .. } => None,
        }
    }
}

/// Runtime configuration shared by every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// SQLite database file name or path.
    pub db_name: String,
}

impl Settings {
    /// Loads settings from `env_file`, letting the process environment win.
    pub fn load(env_file: impl AsRef<Path>) -> SettingsResult<Self> {
        Self::load_with(env_file, |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with an injectable environment lookup.
    ///
    /// `lookup` receives upper-case keys.
    pub fn load_with<F>(env_file: impl AsRef<Path>, lookup: F) -> SettingsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_values = read_env_file(env_file.as_ref())?;

        let db_name = lookup(DB_NAME_KEY)
            .or_else(|| file_values.get(DB_NAME_KEY).cloned())
            .ok_or(SettingsError::Missing("db_name"))?;

        let db_name = db_name.trim();
        if db_name.is_empty() {
            return Err(SettingsError::Invalid {
                key: "db_name",
                message: "value cannot be empty".to_string(),
            });
        }

        Ok(Self {
            db_name: db_name.to_string(),
        })
    }
}

/// Joins `filename` onto `base_dir` and returns an absolute path.
///
/// Relative `base_dir` values resolve against the current directory.
pub fn env_file_path(base_dir: impl AsRef<Path>, filename: &str) -> PathBuf {
    let joined = base_dir.as_ref().join(filename);
    std::path::absolute(&joined).unwrap_or(joined)
}

/// Default env file location: `.env` in the current directory.
pub fn default_env_file() -> PathBuf {
    env_file_path(".", DEFAULT_ENV_FILE)
}

fn read_env_file(path: &Path) -> SettingsResult<HashMap<String, String>> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(err) if err.not_found() => return Ok(HashMap::new()),
        Err(source) => {
            return Err(SettingsError::EnvFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut values = HashMap::new();
    for entry in entries {
        let (key, value) = entry.map_err(|source| SettingsError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        values.insert(key.to_ascii_uppercase(), value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::{env_file_path, Settings, SettingsError};
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_env(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        file.write_all(contents.as_bytes())
            .expect("temp file should be writable");
        file
    }

    #[test]
    fn env_file_path_is_absolute() {
        let path = env_file_path("relative/dir", ".env");
        assert!(path.is_absolute());
        assert!(path.ends_with("relative/dir/.env"));
    }

    #[test]
    fn loads_db_name_from_file() {
        let file = write_env("DB_NAME=stocks.sqlite\n");
        let settings = Settings::load_with(file.path(), no_env).unwrap();
        assert_eq!(settings.db_name, "stocks.sqlite");
    }

    #[test]
    fn file_keys_are_case_insensitive() {
        let file = write_env("db_name=lower.sqlite\n");
        let settings = Settings::load_with(file.path(), no_env).unwrap();
        assert_eq!(settings.db_name, "lower.sqlite");
    }

    #[test]
    fn environment_overrides_file() {
        let file = write_env("DB_NAME=from_file.sqlite\n");
        let settings = Settings::load_with(file.path(), |key| {
            (key == "DB_NAME").then(|| "from_env.sqlite".to_string())
        })
        .unwrap();
        assert_eq!(settings.db_name, "from_env.sqlite");
    }

    #[test]
    fn missing_file_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with(dir.path().join("absent.env"), |_| {
            Some("env_only.sqlite".to_string())
        })
        .unwrap();
        assert_eq!(settings.db_name, "env_only.sqlite");
    }

    #[test]
    fn missing_value_is_reported() {
        let file = write_env("OTHER=1\n");
        let err = Settings::load_with(file.path(), no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("db_name")));
    }

    #[test]
    fn blank_value_is_invalid() {
        let file = write_env("DB_NAME=\"   \"\n");
        let err = Settings::load_with(file.path(), no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "db_name", .. }));
    }
}
