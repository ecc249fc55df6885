use super::split_fields;
use crate::error::{StorageError, StorageResult};
use crate::store::{LineRecord, RecordKind};
use checkpoint_core::CredentialId;

/// Violation counter row: `personId,count`
///
/// Counts only ever go up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationRecord {
    pub person_id: CredentialId,
    pub count: u32,
}

impl ViolationRecord {
    /// Test helper style constructor; panics on an invalid id.
    #[cfg(test)]
    pub(crate) fn new(person_id: &str, count: u32) -> Self {
        Self {
            person_id: CredentialId::new(person_id).unwrap(),
            count,
        }
    }

    pub fn first(person_id: CredentialId) -> Self {
        Self { person_id, count: 1 }
    }
}

impl LineRecord for ViolationRecord {
    const KIND: RecordKind = RecordKind::Violations;

    fn parse_line(line: &str) -> StorageResult<Self> {
        let fields = split_fields(line, 2)?;
        let person_id = CredentialId::new(fields[0])?;
        let count = fields[1]
            .parse::<u32>()
            .map_err(|_| StorageError::MalformedRecord(format!("invalid count '{}'", fields[1])))?;

        Ok(Self { person_id, count })
    }

    fn to_line(&self) -> String {
        format!("{},{}", self.person_id, self.count)
    }
}
