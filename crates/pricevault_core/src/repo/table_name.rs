//! Validated SQL table identifiers.
//!
//! # Responsibility
//! - Gate every table name that ends up inside SQL text.
//!
//! # Invariants
//! - A `TableName` only contains `[A-Za-z0-9_.-]`, so double-quoting it
//!   can never be escaped.
//! - SQLite-reserved `sqlite_*` names are rejected.
//! - Index names contain `:`, which the allow-list forbids, so an index
//!   created for one table never collides with another valid table name.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]{0,127}$").expect("valid table name regex")
});

const RESERVED_PREFIX: &str = "sqlite_";

/// Table identifier that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Returns `None` when `raw` is empty, reserved, or contains characters
    /// outside the allow-list.
    pub fn parse(raw: &str) -> Option<Self> {
        if !TABLE_NAME_RE.is_match(raw) {
            return None;
        }
        if raw.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier for use in SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Quoted name of the `date` index that accompanies the table.
    pub fn quoted_date_index(&self) -> String {
        format!("\"{}\"", self.date_index_name())
    }

    /// Unquoted `date` index name; never a valid `TableName` itself.
    pub fn date_index_name(&self) -> String {
        format!("{}:date", self.0)
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::TableName;

    #[test]
    fn accepts_ticker_style_names() {
        for name in ["AAPL", "ibm", "SHOPERSTOP.BSE", "BRK-B", "_scratch", "2024_bars"] {
            assert!(TableName::parse(name).is_some(), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_injection_and_reserved_names() {
        for name in [
            "",
            "bars; DROP TABLE users",
            "bars\"",
            "bars'",
            "two words",
            ".hidden",
            "sqlite_master",
            "SQLITE_sequence",
        ] {
            assert!(TableName::parse(name).is_none(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(129);
        assert!(TableName::parse(&long).is_none());
        assert!(TableName::parse(&long[..128]).is_some());
    }

    #[test]
    fn quoting_wraps_name() {
        let name = TableName::parse("IBM.BSE").unwrap();
        assert_eq!(name.quoted(), "\"IBM.BSE\"");
        assert_eq!(name.quoted_date_index(), "\"IBM.BSE:date\"");
    }

    #[test]
    fn date_index_name_is_outside_table_namespace() {
        for raw in ["t", "ix_t_date", "AAPL", "x:date"] {
            if let Some(name) = TableName::parse(raw) {
                assert!(TableName::parse(&name.date_index_name()).is_none());
            }
        }
    }
}
