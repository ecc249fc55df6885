use super::{Checked, Expiring, require_plain, split_fields};
use crate::error::{StorageError, StorageResult};
use crate::store::{LineRecord, RecordKind};
use checkpoint_core::constants::{GRACE_WINDOW, NOT_APPLICABLE, SPECIAL_PASS_VALIDITY};
use checkpoint_core::{CredentialId, PersonRecord, RecordStatus, Role, TimestampField};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Fields a full visitor row must have; the two check-time columns may be
/// missing on rows written by older layouts.
const MIN_FIELDS: usize = 10;

/// Special Pass registration (one row of the visitor file)
///
/// # Columns
///
/// `name,contact,visitingAs,purpose,visiting,idType,specialPassId,createdAt,expiresAt,status,checkInTime,checkOutTime`
///
/// # Lifecycle
///
/// - Created by a visitor registration, or on the first scan of a pass that
///   only exists in the roster.
/// - `expires_at` is fixed at creation: `created_at` + 24h.
/// - A re-registration of the same pass id flips the old row to INACTIVE; it
///   is never edited otherwise.
/// - Purged by the cleanup pass once more than an hour past expiry.
///
/// The check state is derived from the two check-time columns, see
/// [`Checked::check_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialPassRecord {
    pub name: String,
    pub contact: String,
    pub visiting_as: String,
    pub purpose: String,
    pub visiting: String,
    pub id_type: String,
    pub special_pass_id: CredentialId,
    pub created_at: TimestampField,
    pub expires_at: TimestampField,
    pub status: RecordStatus,
    pub check_in_time: TimestampField,
    pub check_out_time: TimestampField,
}

/// Visitor registration form as submitted at the guard desk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorRegistration {
    pub name: String,
    pub contact: String,
    pub visiting_as: String,
    pub purpose: String,
    pub visiting: String,
    pub id_type: String,
    pub special_pass_id: String,
}

impl VisitorRegistration {
    /// Check the required fields and return the pass id.
    ///
    /// # Errors
    /// `MissingField` for an empty field, `Validation` for text that would
    /// break the line format, `Core` for an unusable pass id.
    pub fn validate(&self) -> StorageResult<CredentialId> {
        let fields = [
            ("name", &self.name),
            ("contact", &self.contact),
            ("visiting_as", &self.visiting_as),
            ("purpose", &self.purpose),
            ("visiting", &self.visiting),
            ("id_type", &self.id_type),
            ("special_pass_id", &self.special_pass_id),
        ];

        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(StorageError::MissingField(field.to_string()));
            }
            require_plain(field, value)?;
        }

        Ok(CredentialId::new(&self.special_pass_id)?)
    }
}

/// Who holds a pass id that is still live
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassHolder {
    pub name: String,
    pub expires_at: String,
}

impl SpecialPassRecord {
    /// Build a fresh ACTIVE registration from a validated form.
    pub fn from_registration(
        form: &VisitorRegistration,
        special_pass_id: CredentialId,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            name: form.name.trim().to_string(),
            contact: form.contact.trim().to_string(),
            visiting_as: form.visiting_as.trim().to_string(),
            purpose: form.purpose.trim().to_string(),
            visiting: form.visiting.trim().to_string(),
            id_type: form.id_type.trim().to_string(),
            special_pass_id,
            created_at: created_at.into(),
            expires_at: (created_at + SPECIAL_PASS_VALIDITY).into(),
            status: RecordStatus::Active,
            check_in_time: TimestampField::Empty,
            check_out_time: TimestampField::Empty,
        }
    }

    /// Build a registration for a pass that so far only exists in the roster.
    pub fn from_roster(special_pass_id: CredentialId, person: &PersonRecord, now: NaiveDateTime) -> Self {
        Self {
            name: super::clean_field(&person.name),
            contact: NOT_APPLICABLE.to_string(),
            visiting_as: Role::Special.to_string(),
            purpose: "Special Pass Access".to_string(),
            visiting: NOT_APPLICABLE.to_string(),
            id_type: "RFID".to_string(),
            special_pass_id,
            created_at: now.into(),
            expires_at: (now + SPECIAL_PASS_VALIDITY).into(),
            status: RecordStatus::Active,
            check_in_time: TimestampField::Empty,
            check_out_time: TimestampField::Empty,
        }
    }

    pub fn is_for(&self, id: &CredentialId) -> bool {
        id == &self.special_pass_id
    }

    /// Whether a late check-in may still check out after expiry.
    ///
    /// True iff the pass had at most [`GRACE_WINDOW`] left when it checked
    /// in and `now` is past expiry. Any unreadable timestamp means no grace.
    pub fn is_in_grace_period(&self, now: NaiveDateTime) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let (Some(check_in), Some(expires)) = (self.check_in_time.valid(), self.expires_at.valid())
        else {
            return false;
        };

        expires - check_in <= GRACE_WINDOW && now > expires
    }

    pub fn holder(&self) -> PassHolder {
        PassHolder {
            name: self.name.clone(),
            expires_at: self.expires_at.to_string(),
        }
    }

    /// Surface the registration as a person with role SPECIAL.
    pub fn to_person(&self) -> PersonRecord {
        PersonRecord::new(self.special_pass_id.clone(), Role::Special, self.name.clone())
            .with_status(self.status)
    }
}

impl Checked for SpecialPassRecord {
    fn check_columns(&self) -> (&TimestampField, &TimestampField) {
        (&self.check_in_time, &self.check_out_time)
    }

    fn check_columns_mut(&mut self) -> (&mut TimestampField, &mut TimestampField) {
        (&mut self.check_in_time, &mut self.check_out_time)
    }
}

impl Expiring for SpecialPassRecord {
    fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn expires_at(&self) -> &TimestampField {
        &self.expires_at
    }
}

impl LineRecord for SpecialPassRecord {
    const KIND: RecordKind = RecordKind::Visitors;

    fn parse_line(line: &str) -> StorageResult<Self> {
        let fields = split_fields(line, MIN_FIELDS)?;
        let column = |index: usize| fields.get(index).copied().unwrap_or_default();

        Ok(Self {
            name: column(0).to_string(),
            contact: column(1).to_string(),
            visiting_as: column(2).to_string(),
            purpose: column(3).to_string(),
            visiting: column(4).to_string(),
            id_type: column(5).to_string(),
            special_pass_id: CredentialId::new(column(6))?,
            created_at: TimestampField::parse(column(7)),
            expires_at: TimestampField::parse(column(8)),
            status: column(9).parse()?,
            check_in_time: TimestampField::parse(column(10)),
            check_out_time: TimestampField::parse(column(11)),
        })
    }

    fn to_line(&self) -> String {
        [
            self.name.clone(),
            self.contact.clone(),
            self.visiting_as.clone(),
            self.purpose.clone(),
            self.visiting.clone(),
            self.id_type.clone(),
            self.special_pass_id.to_string(),
            self.created_at.to_string(),
            self.expires_at.to_string(),
            self.status.to_string(),
            self.check_in_time.to_string(),
            self.check_out_time.to_string(),
        ]
        .join(",")
    }

    fn anomaly(&self) -> Option<String> {
        let bad: Vec<&str> = [
            ("created_at", &self.created_at),
            ("expires_at", &self.expires_at),
            ("check_in_time", &self.check_in_time),
            ("check_out_time", &self.check_out_time),
        ]
        .into_iter()
        .filter(|(_, field)| field.is_invalid())
        .map(|(name, _)| name)
        .collect();

        let missing_expiry = self.status.is_active() && self.expires_at.is_empty();
        if bad.is_empty() && !missing_expiry {
            return None;
        }

        let mut detail = format!("pass {}:", self.special_pass_id);
        if !bad.is_empty() {
            detail.push_str(&format!(" unreadable {}", bad.join(", ")));
        }
        if missing_expiry {
            detail.push_str(" active without expiry");
        }
        Some(detail)
    }
}

/// Position of the record that wins among `records` for `id`, considering
/// only those `eligible` accepts.
///
/// The winner is the one with the latest `created_at`; an unreadable
/// `created_at` ranks below any readable one, and ties go to the later row.
pub fn select_latest<'a>(
    records: impl IntoIterator<Item = &'a SpecialPassRecord>,
    id: &CredentialId,
    mut eligible: impl FnMut(&SpecialPassRecord) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, Option<NaiveDateTime>)> = None;

    for (index, record) in records.into_iter().enumerate() {
        if !record.is_for(id) || !eligible(record) {
            continue;
        }
        let created = record.created_at.valid();
        match best {
            Some((_, best_created)) if created < best_created => {}
            _ => best = Some((index, created)),
        }
    }

    best.map(|(index, _)| index)
}

/// Position of the current record for `id`: the freshest ACTIVE one.
pub fn current_index<'a>(
    records: impl IntoIterator<Item = &'a SpecialPassRecord>,
    id: &CredentialId,
) -> Option<usize> {
    select_latest(records, id, |record| record.status.is_active())
}
