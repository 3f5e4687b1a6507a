//! Price table repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a bar dataset as a named table under a conflict policy.
//! - Read a named table back newest-first with an optional row limit.
//!
//! # Invariants
//! - Datasets are validated before any SQL runs.
//! - Each insert runs in one transaction; failures leave no partial table.
//! - Table names reach SQL text only through `TableName`; values and limits
//!   are always bound parameters.
//! - Reads never create or modify tables.
//! - Table names match case-insensitively, as SQLite resolves them.

use crate::db::DbError;
use crate::model::bar::{validate_bars, Bar, BarTime, BarValidationError};
use crate::repo::table_name::TableName;
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Instant;

/// Column set shared by every bar table, in select order.
pub const BAR_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Text layout of the persisted `date` column. Sorts chronologically for
/// years `0..=9999`, which dataset validation enforces.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by table persistence and reads.
#[derive(Debug)]
pub enum RepoError {
    InvalidTableName(String),
    /// Insert with `ConflictPolicy::Fail` hit an existing table.
    TableExists(String),
    TableNotFound(String),
    /// Existing table columns do not match the bar schema.
    SchemaMismatch {
        table: String,
        found: Vec<String>,
    },
    MalformedDataset(BarValidationError),
    Db(DbError),
    /// Stored row could not be decoded into a `Bar`.
    InvalidData(String),
}

impl RepoError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTableName(_) => "invalid_table_name",
            Self::TableExists(_) => "table_exists",
            Self::TableNotFound(_) => "table_not_found",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::MalformedDataset(_) => "malformed_dataset",
            Self::Db(_) => "db_error",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTableName(name) => write!(f, "invalid table name `{name}`"),
            Self::TableExists(name) => write!(f, "table `{name}` already exists"),
            Self::TableNotFound(name) => write!(f, "table `{name}` does not exist"),
            Self::SchemaMismatch { table, found } => write!(
                f,
                "table `{table}` has columns [{}], expected [{}]",
                found.join(", "),
                BAR_COLUMNS.join(", ")
            ),
            Self::MalformedDataset(err) => write!(f, "malformed dataset: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted bar data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedDataset(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidTableName(_)
            | Self::TableExists(_)
            | Self::TableNotFound(_)
            | Self::SchemaMismatch { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<BarValidationError> for RepoError {
    fn from(value: BarValidationError) -> Self {
        Self::MalformedDataset(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Behavior when the target table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Refuse to touch an existing table.
    #[default]
    Fail,
    /// Drop the existing table, then recreate it.
    Replace,
    /// Add rows to the existing table.
    Append,
}

impl ConflictPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Append => "append",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => Err(format!(
                "unsupported conflict policy `{other}`; expected fail|replace|append"
            )),
        }
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub success: bool,
    pub rows_inserted: usize,
}

/// Repository interface for named bar tables.
pub trait TableRepository {
    fn insert_table(
        &self,
        table_name: &str,
        bars: &[Bar],
        policy: ConflictPolicy,
    ) -> RepoResult<InsertOutcome>;

    /// Returns bars newest-first; `limit` keeps only the most recent rows.
    fn read_table(&self, table_name: &str, limit: Option<u32>) -> RepoResult<Vec<Bar>>;

    fn table_exists(&self, table_name: &str) -> RepoResult<bool>;

    /// Inserts with the default `ConflictPolicy::Fail`.
    fn insert(&self, table_name: &str, bars: &[Bar]) -> RepoResult<InsertOutcome> {
        self.insert_table(table_name, bars, ConflictPolicy::default())
    }
}

/// SQLite-backed table repository borrowing a caller-owned connection.
pub struct SqliteTableRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTableRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_in_transaction(
        &self,
        table: &TableName,
        bars: &[Bar],
        policy: ConflictPolicy,
    ) -> RepoResult<usize> {
        // Rolls back on drop if any step below fails.
        let tx = self.conn.unchecked_transaction()?;

        match (policy, table_exists(&tx, table)?) {
            (ConflictPolicy::Fail, true) => {
                return Err(RepoError::TableExists(table.to_string()));
            }
            (ConflictPolicy::Replace, true) => {
                tx.execute_batch(&format!("DROP TABLE {};", table.quoted()))?;
                create_table(&tx, table)?;
            }
            (ConflictPolicy::Append, true) => {
                ensure_columns(&tx, table, ColumnCheck::Exact)?;
            }
            (_, false) => create_table(&tx, table)?,
        }

        let inserted = insert_rows(&tx, table, bars)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn read_rows(&self, table: &TableName, limit: Option<u32>) -> RepoResult<Vec<Bar>> {
        if !table_exists(self.conn, table)? {
            return Err(RepoError::TableNotFound(table.to_string()));
        }
        ensure_columns(self.conn, table, ColumnCheck::Contains)?;

        // Other writers may use a `T` separator; compare as if it were a space.
        let sql = format!(
            "SELECT {} FROM {} ORDER BY replace(date, 'T', ' ') DESC LIMIT ?1;",
            BAR_COLUMNS.join(", "),
            table.quoted()
        );
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([limit])?;
        let mut bars = Vec::new();
        while let Some(row) = rows.next()? {
            bars.push(parse_bar_row(row)?);
        }
        Ok(bars)
    }
}

impl TableRepository for SqliteTableRepository<'_> {
    fn insert_table(
        &self,
        table_name: &str,
        bars: &[Bar],
        policy: ConflictPolicy,
    ) -> RepoResult<InsertOutcome> {
        let started_at = Instant::now();
        let result = parse_table_name(table_name).and_then(|table| {
            validate_bars(bars)?;
            self.insert_in_transaction(&table, bars, policy)
        });

        match result {
            Ok(rows_inserted) => {
                info!(
                    "event=table_insert module=repo status=ok table={} policy={} rows={} duration_ms={}",
                    table_name,
                    policy.as_str(),
                    rows_inserted,
                    started_at.elapsed().as_millis()
                );
                Ok(InsertOutcome {
                    success: true,
                    rows_inserted,
                })
            }
            Err(err) => {
                warn!(
                    "event=table_insert module=repo status=error policy={} duration_ms={} error_code={}",
                    policy.as_str(),
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn read_table(&self, table_name: &str, limit: Option<u32>) -> RepoResult<Vec<Bar>> {
        let started_at = Instant::now();
        let result = parse_table_name(table_name).and_then(|table| self.read_rows(&table, limit));

        match &result {
            Ok(bars) => info!(
                "event=table_read module=repo status=ok table={} rows={} duration_ms={}",
                table_name,
                bars.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=table_read module=repo status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn table_exists(&self, table_name: &str) -> RepoResult<bool> {
        let table = parse_table_name(table_name)?;
        table_exists(self.conn, &table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnCheck {
    /// Column set must equal `BAR_COLUMNS`.
    Exact,
    /// Column set must include `BAR_COLUMNS`; extras are ignored.
    Contains,
}

fn parse_table_name(raw: &str) -> RepoResult<TableName> {
    TableName::parse(raw).ok_or_else(|| RepoError::InvalidTableName(raw.to_string()))
}

fn table_exists(conn: &Connection, table: &TableName) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1 COLLATE NOCASE
        );",
        [table.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn create_table(conn: &Connection, table: &TableName) -> RepoResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
            date TIMESTAMP NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume REAL NOT NULL
        );
        CREATE INDEX {index} ON {table} (date);",
        table = table.quoted(),
        index = table.quoted_date_index(),
    ))?;
    Ok(())
}

fn ensure_columns(conn: &Connection, table: &TableName, check: ColumnCheck) -> RepoResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid;")?;
    let found = stmt
        .query_map([table.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let has = |column: &str| found.iter().any(|name| name.eq_ignore_ascii_case(column));
    let all_present = BAR_COLUMNS.iter().all(|column| has(column));
    let compatible = match check {
        ColumnCheck::Exact => all_present && found.len() == BAR_COLUMNS.len(),
        ColumnCheck::Contains => all_present,
    };

    if compatible {
        Ok(())
    } else {
        Err(RepoError::SchemaMismatch {
            table: table.to_string(),
            found,
        })
    }
}

fn insert_rows(conn: &Connection, table: &TableName, bars: &[Bar]) -> RepoResult<usize> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        table.quoted(),
        BAR_COLUMNS.join(", ")
    ))?;

    let mut inserted = 0;
    for bar in bars {
        inserted += stmt.execute(params![
            bar.date.format(DATE_FORMAT).to_string(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        ])?;
    }
    Ok(inserted)
}

fn parse_bar_row(row: &Row<'_>) -> RepoResult<Bar> {
    let date = match row.get_ref("date")? {
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                RepoError::InvalidData("non UTF-8 text in `date` column".to_string())
            })?;
            parse_bar_time(text).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid timestamp `{text}` in `date` column"))
            })?
        }
        ValueRef::Null => {
            return Err(RepoError::InvalidData("null value in `date` column".to_string()));
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "unsupported {:?} value in `date` column",
                other.data_type()
            )));
        }
    };

    Ok(Bar {
        date,
        open: numeric_column(row, "open")?,
        high: numeric_column(row, "high")?,
        low: numeric_column(row, "low")?,
        close: numeric_column(row, "close")?,
        volume: numeric_column(row, "volume")?,
    })
}

fn numeric_column(row: &Row<'_>, column: &str) -> RepoResult<f64> {
    match row.get_ref(column)? {
        ValueRef::Real(value) => Ok(value),
        ValueRef::Integer(value) => Ok(value as f64),
        ValueRef::Null => Err(RepoError::InvalidData(format!(
            "null value in `{column}` column"
        ))),
        other => Err(RepoError::InvalidData(format!(
            "non-numeric {:?} value in `{column}` column",
            other.data_type()
        ))),
    }
}

/// Parses stored timestamps written by this crate or by other SQLite
/// writers (`T` separator, date-only values).
fn parse_bar_time(text: &str) -> Option<BarTime> {
    let text = text.trim();
    BarTime::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| BarTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::{parse_bar_time, ConflictPolicy, DATE_FORMAT};
    use chrono::NaiveDate;

    #[test]
    fn conflict_policy_defaults_to_fail() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Fail);
    }

    #[test]
    fn conflict_policy_parses_case_insensitively() {
        assert_eq!(
            " Replace ".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::Replace
        );
        assert_eq!(
            "append".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::Append
        );
        assert!("upsert".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn stored_timestamp_format_round_trips() {
        let stamp = NaiveDate::from_ymd_opt(2023, 7, 14)
            .and_then(|date| date.and_hms_milli_opt(9, 30, 0, 250))
            .unwrap();
        let text = stamp.format(DATE_FORMAT).to_string();
        assert_eq!(text, "2023-07-14 09:30:00.250");
        assert_eq!(parse_bar_time(&text), Some(stamp));
    }

    #[test]
    fn parses_foreign_timestamp_layouts() {
        let midnight = NaiveDate::from_ymd_opt(2023, 7, 14)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(parse_bar_time("2023-07-14 00:00:00"), Some(midnight));
        assert_eq!(parse_bar_time("2023-07-14T00:00:00"), Some(midnight));
        assert_eq!(parse_bar_time("2023-07-14"), Some(midnight));
        assert_eq!(parse_bar_time("14/07/2023"), None);
    }
}
