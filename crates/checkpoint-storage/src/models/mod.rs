pub mod access_log;
pub mod attendance;
pub mod checks;
pub mod person;
pub mod special_pass;
pub mod validity;
pub mod violation;

pub use access_log::AccessLogEntry;
pub use attendance::AttendanceRecord;
pub use checks::{CheckTimes, Checked};
pub use special_pass::{PassHolder, SpecialPassRecord, VisitorRegistration};
pub use validity::Expiring;
pub use violation::ViolationRecord;

use crate::error::{StorageError, StorageResult};
use checkpoint_core::constants::FIELD_SEPARATOR;

/// Split a line into trimmed fields, requiring at least `min` of them.
pub(crate) fn split_fields(line: &str, min: usize) -> StorageResult<Vec<&str>> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() < min {
        return Err(StorageError::MalformedRecord(format!(
            "expected at least {min} fields, got {}",
            fields.len()
        )));
    }
    Ok(fields)
}

/// Make free text safe for a single column.
pub(crate) fn clean_field(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ',' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Reject text that would break the line format.
pub(crate) fn require_plain(field: &str, value: &str) -> StorageResult<()> {
    if value.contains([FIELD_SEPARATOR, '\n', '\r']) {
        return Err(StorageError::Validation(format!(
            "{field} must not contain commas or line breaks"
        )));
    }
    Ok(())
}
