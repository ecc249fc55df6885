use crate::error::StorageResult;
use crate::models::{AttendanceRecord, CheckTimes, Checked};
use crate::store::{Document, FlatFileStore};
use checkpoint_core::{CheckStatus, CheckType, Clock, CredentialId, PersonRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Student and teacher check-in/check-out tracking
///
/// Kept in its own file, one row per card. The row is created by the first
/// check recorded for the card. Only ACTIVE students and teachers are
/// tracked; anyone else is refused without touching the file.
pub struct AttendanceTracker {
    store: Arc<FlatFileStore>,
    clock: Arc<dyn Clock>,
}

impl AttendanceTracker {
    pub fn new(store: Arc<FlatFileStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn find(&self, card_id: &CredentialId) -> StorageResult<Option<AttendanceRecord>> {
        let records = self.store.load_all::<AttendanceRecord>().await?;
        Ok(records.into_iter().find(|record| record.is_for(card_id)))
    }

    /// `CheckedOut` for a card with no row yet.
    pub async fn check_status(&self, card_id: &CredentialId) -> StorageResult<CheckStatus> {
        Ok(self
            .find(card_id)
            .await?
            .map(|record| record.check_status())
            .unwrap_or_default())
    }

    pub async fn check_times(&self, card_id: &CredentialId) -> StorageResult<CheckTimes> {
        Ok(self
            .find(card_id)
            .await?
            .map(|record| record.check_times())
            .unwrap_or_default())
    }

    /// Record `check` for `person`, creating the row when needed.
    ///
    /// Returns `false` when the person is not an ACTIVE student or teacher.
    pub async fn record_check(&self, person: &PersonRecord, check: CheckType) -> StorageResult<bool> {
        Ok(self.apply(person, |_| check).await?.is_some())
    }

    /// Check in when checked out, out when checked in. Returns the check
    /// performed, or `None` for a person who is not tracked.
    pub async fn toggle(&self, person: &PersonRecord) -> StorageResult<Option<CheckType>> {
        self.apply(person, |record| record.next_check()).await
    }

    async fn apply(
        &self,
        person: &PersonRecord,
        choose: impl FnOnce(&AttendanceRecord) -> CheckType,
    ) -> StorageResult<Option<CheckType>> {
        if !person.role.is_student_or_teacher() || !person.is_active() {
            debug!(card = %person.id, role = %person.role, "Attendance not tracked");
            return Ok(None);
        }

        let now = self.clock.now();
        let check = self
            .store
            .rewrite_all(|doc: &mut Document<AttendanceRecord>| {
                let existing = doc.records().position(|record| record.is_for(&person.id));
                let index = match existing {
                    Some(index) => index,
                    None => {
                        doc.push(AttendanceRecord::for_person(person, now));
                        doc.record_count() - 1
                    }
                };

                doc.record_mut(index).map(|record| {
                    let check = choose(&*record);
                    record.apply_check(check, now);
                    check
                })
            })
            .await?;

        if let Some(check) = check {
            info!(card = %person.id, role = %person.role, check = %check, "Recorded attendance");
        }
        Ok(check)
    }
}
