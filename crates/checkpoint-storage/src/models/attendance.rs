use super::{Checked, clean_field, split_fields};
use crate::error::{StorageError, StorageResult};
use crate::store::{LineRecord, RecordKind};
use checkpoint_core::{CredentialId, PersonRecord, Role, TimestampField};
use chrono::NaiveDateTime;

/// Student/teacher attendance row
///
/// `cardId,role,name,createdAt,checkInTime,checkOutTime`
///
/// One row per card, created on the first recorded check and updated in
/// place afterwards. The check state follows the same rules as a Special
/// Pass, see [`Checked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub card_id: CredentialId,
    pub role: Role,
    pub name: String,
    pub created_at: TimestampField,
    pub check_in_time: TimestampField,
    pub check_out_time: TimestampField,
}

impl AttendanceRecord {
    /// Fresh row for a roster person, with no check recorded yet.
    pub fn for_person(person: &PersonRecord, now: NaiveDateTime) -> Self {
        Self {
            card_id: person.id.clone(),
            role: person.role,
            name: clean_field(&person.name),
            created_at: now.into(),
            check_in_time: TimestampField::Empty,
            check_out_time: TimestampField::Empty,
        }
    }

    pub fn is_for(&self, card_id: &CredentialId) -> bool {
        card_id == &self.card_id
    }
}

impl Checked for AttendanceRecord {
    fn check_columns(&self) -> (&TimestampField, &TimestampField) {
        (&self.check_in_time, &self.check_out_time)
    }

    fn check_columns_mut(&mut self) -> (&mut TimestampField, &mut TimestampField) {
        (&mut self.check_in_time, &mut self.check_out_time)
    }
}

impl LineRecord for AttendanceRecord {
    const KIND: RecordKind = RecordKind::Attendance;

    fn parse_line(line: &str) -> StorageResult<Self> {
        let fields = split_fields(line, 4)?;
        let column = |index: usize| fields.get(index).copied().unwrap_or_default();

        let role: Role = column(1).parse()?;
        if !role.is_student_or_teacher() {
            return Err(StorageError::MalformedRecord(format!(
                "attendance is not tracked for role {role}"
            )));
        }

        Ok(Self {
            card_id: CredentialId::new(column(0))?,
            role,
            name: column(2).to_string(),
            created_at: TimestampField::parse(column(3)),
            check_in_time: TimestampField::parse(column(4)),
            check_out_time: TimestampField::parse(column(5)),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.card_id,
            self.role,
            self.name,
            self.created_at,
            self.check_in_time,
            self.check_out_time
        )
    }

    fn anomaly(&self) -> Option<String> {
        let bad: Vec<&str> = [
            ("created_at", &self.created_at),
            ("check_in_time", &self.check_in_time),
            ("check_out_time", &self.check_out_time),
        ]
        .into_iter()
        .filter(|(_, field)| field.is_invalid())
        .map(|(name, _)| name)
        .collect();

        (!bad.is_empty()).then(|| format!("card {}: unreadable {}", self.card_id, bad.join(", ")))
    }
}
