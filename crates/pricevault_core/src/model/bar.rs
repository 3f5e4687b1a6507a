//! Price bar domain model.
//!
//! # Responsibility
//! - Define the typed row persisted in every price table.
//! - Reject datasets the store cannot hold faithfully.
//!
//! # Invariants
//! - Prices and volume are finite; SQLite would store NaN as NULL.
//! - `date` years stay within `0..=9999` so the stored text sorts
//!   chronologically.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Timestamp type used for the `date` column.
pub type BarTime = NaiveDateTime;

/// Years representable as four-digit, zero-padded text.
pub const MIN_YEAR: i32 = 0;
pub const MAX_YEAR: i32 = 9999;

/// One OHLCV record keyed by its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time. Stored as ISO text, ordered lexicographically.
    pub date: BarTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded quantity during the bar.
    pub volume: f64,
}

/// Reasons a dataset cannot be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum BarValidationError {
    /// A price or volume field is NaN or infinite.
    NonFinite { row: usize, field: &'static str },
    YearOutOfRange { row: usize, year: i32 },
}

impl Display for BarValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite { row, field } => {
                write!(f, "row {row}: `{field}` must be a finite number")
            }
            Self::YearOutOfRange { row, year } => write!(
                f,
                "row {row}: `date` year {year} is outside {MIN_YEAR}..={MAX_YEAR}"
            ),
        }
    }
}

impl Error for BarValidationError {}

impl Bar {
    pub fn new(date: BarTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Checks that the row can be stored. `row` is only used for error reporting.
    pub fn validate_at(&self, row: usize) -> Result<(), BarValidationError> {
        for (field, value) in self.numeric_fields() {
            if !value.is_finite() {
                return Err(BarValidationError::NonFinite { row, field });
            }
        }
        let year = self.date.year();
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(BarValidationError::YearOutOfRange { row, year });
        }
        Ok(())
    }

    fn numeric_fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
    }
}

/// Validates every row. An empty dataset is valid.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BarValidationError> {
    bars.iter()
        .enumerate()
        .try_for_each(|(row, bar)| bar.validate_at(row))
}

/// Sorts bars most-recent-first, the order reads return.
pub fn sort_newest_first(bars: &mut [Bar]) {
    bars.sort_by(|left, right| right.date.cmp(&left.date));
}

#[cfg(test)]
mod tests {
    use super::{sort_newest_first, validate_bars, Bar, BarValidationError};
    use chrono::NaiveDate;

    fn at(day: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid test date")
    }

    fn in_year(year: i32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid test date")
    }

    #[test]
    fn empty_dataset_is_valid() {
        assert!(validate_bars(&[]).is_ok());
    }

    #[test]
    fn rejects_nan_price() {
        let bars = vec![Bar::new(at(1), 1.0, f64::NAN, 0.5, 1.0, 10.0)];
        assert_eq!(
            validate_bars(&bars),
            Err(BarValidationError::NonFinite {
                row: 0,
                field: "high"
            })
        );
    }

    #[test]
    fn accepts_unusual_but_numeric_rows() {
        let bars = vec![
            Bar::new(at(1), 1.0, 0.5, 2.0, 1.5, -3.0),
            Bar::new(at(1), 1.1, 2.1, 0.6, 1.6, 2.0),
        ];
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn rejects_years_without_four_digit_text() {
        let bars = vec![
            Bar::new(in_year(2024), 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(in_year(10_000), 1.0, 1.0, 1.0, 1.0, 1.0),
        ];
        assert_eq!(
            validate_bars(&bars),
            Err(BarValidationError::YearOutOfRange {
                row: 1,
                year: 10_000
            })
        );

        let negative = vec![Bar::new(in_year(-1), 1.0, 1.0, 1.0, 1.0, 1.0)];
        assert!(matches!(
            validate_bars(&negative),
            Err(BarValidationError::YearOutOfRange { row: 0, year: -1 })
        ));

        let edges = vec![
            Bar::new(in_year(0), 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(in_year(9999), 1.0, 1.0, 1.0, 1.0, 1.0),
        ];
        assert!(validate_bars(&edges).is_ok());
    }

    #[test]
    fn sort_newest_first_orders_descending() {
        let mut bars = vec![
            Bar::new(at(2), 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(at(5), 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(at(1), 1.0, 1.0, 1.0, 1.0, 1.0),
        ];
        sort_newest_first(&mut bars);
        let days: Vec<_> = bars.iter().map(|bar| bar.date).collect();
        assert_eq!(days, vec![at(5), at(2), at(1)]);
    }
}
