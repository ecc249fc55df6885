//! Second-precision local timestamps as stored in the flat files.
//!
//! Timestamp columns may be empty (no check-in yet) or hold text that does
//! not parse. [`TimestampField`] keeps all three cases so a rewrite puts back
//! exactly what it read.

use crate::{Result, constants::TIMESTAMP_FORMAT, error::Error};
use chrono::{NaiveDateTime, Timelike};
use std::fmt;

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp.
///
/// # Errors
/// Returns `Error::InvalidTimestamp` if the text does not match the layout.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|_| {
        Error::InvalidTimestamp {
            value: value.to_string(),
            expected: TIMESTAMP_FORMAT.to_string(),
        }
    })
}

/// Format a timestamp in the file layout.
#[must_use]
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Drop sub-second precision, which the file layout cannot hold.
#[must_use]
pub fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

/// A timestamp column value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimestampField {
    #[default]
    Empty,
    Valid(NaiveDateTime),
    /// Text that did not parse, kept verbatim.
    Invalid(String),
}

impl TimestampField {
    /// Interpret a raw column.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return TimestampField::Empty;
        }
        match parse_timestamp(raw) {
            Ok(value) => TimestampField::Valid(value),
            Err(_) => TimestampField::Invalid(raw.to_string()),
        }
    }

    #[must_use]
    pub fn valid(&self) -> Option<NaiveDateTime> {
        match self {
            TimestampField::Valid(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, TimestampField::Empty)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, TimestampField::Invalid(_))
    }
}

impl From<NaiveDateTime> for TimestampField {
    fn from(value: NaiveDateTime) -> Self {
        TimestampField::Valid(truncate_to_seconds(value))
    }
}

impl fmt::Display for TimestampField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimestampField::Empty => Ok(()),
            TimestampField::Valid(value) => f.write_str(&format_timestamp(*value)),
            TimestampField::Invalid(raw) => f.write_str(raw),
        }
    }
}
