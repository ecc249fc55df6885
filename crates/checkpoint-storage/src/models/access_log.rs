use super::{clean_field, split_fields};
use crate::error::StorageResult;
use crate::store::{LineRecord, RecordKind};
use checkpoint_core::timestamp::{format_timestamp, parse_timestamp};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Access log line: `timestamp,id,action,status`
///
/// Entries are written once and never edited. The `id` is whatever was
/// scanned, including text that is not a valid credential, so that scans
/// with garbage input still leave a trail.
///
/// # Examples
///
/// ```
/// use checkpoint_storage::models::AccessLogEntry;
/// use checkpoint_core::timestamp::parse_timestamp;
///
/// let at = parse_timestamp("2025-03-14 09:05:00").unwrap();
/// let entry = AccessLogEntry::new(at, "5551234567", "SPECIAL_PASS_CHECK_IN", "SUCCESS");
/// assert!(entry.is_success());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessLogEntry {
    pub timestamp: NaiveDateTime,
    pub id: String,
    pub action: String,
    pub status: String,
}

impl AccessLogEntry {
    /// Create an entry; separators in the text fields are blanked out.
    pub fn new(timestamp: NaiveDateTime, id: &str, action: &str, status: &str) -> Self {
        Self {
            timestamp,
            id: clean_field(id),
            action: clean_field(action),
            status: clean_field(status),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == checkpoint_core::constants::DEFAULT_LOG_STATUS
    }
}

impl LineRecord for AccessLogEntry {
    const KIND: RecordKind = RecordKind::AccessLog;

    fn parse_line(line: &str) -> StorageResult<Self> {
        let fields = split_fields(line, 4)?;
        Ok(Self {
            timestamp: parse_timestamp(fields[0])?,
            id: fields[1].to_string(),
            action: fields[2].to_string(),
            status: fields[3].to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            format_timestamp(self.timestamp),
            self.id,
            self.action,
            self.status
        )
    }
}
