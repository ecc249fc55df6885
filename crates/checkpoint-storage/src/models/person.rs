//! Roster rows: `id,role,name[,status]`
//!
//! The roster is provisioned by the site administrator. Besides people
//! (guards, students, teachers, roster-seeded Special Passes) it carries a
//! mapping table for students who type their number instead of tapping:
//!
//! ```text
//! 2021-00123,STUDENT_NUMBER,Jane Doe,ACTIVE
//! 0012345678,STUDENT_RFID,2021-00123,ACTIVE
//! ```
//!
//! The first row says the number is valid and whose it is; the second says
//! which RFID id that number resolves to.

use super::split_fields;
use crate::error::StorageResult;
use crate::store::{LineRecord, RecordKind};
use checkpoint_core::{CredentialId, PersonRecord, RecordStatus, Role};

impl LineRecord for PersonRecord {
    const KIND: RecordKind = RecordKind::Roster;

    fn parse_line(line: &str) -> StorageResult<Self> {
        let fields = split_fields(line, 3)?;

        let id = CredentialId::new(fields[0])?;
        let role: Role = fields[1].parse()?;
        let status = match fields.get(3) {
            Some(raw) if !raw.is_empty() => raw.parse()?,
            _ => RecordStatus::Active,
        };

        Ok(PersonRecord {
            id,
            role,
            name: fields[2].to_string(),
            status,
        })
    }

    fn to_line(&self) -> String {
        format!("{},{},{},{}", self.id, self.role, self.name, self.status)
    }
}
