//! Special Pass lifecycle
//!
//! Owns the visitor file: registration, check-in/check-out, deactivation of
//! superseded registrations and purging of stale ones. Every operation that
//! mutates runs as one [`FlatFileStore::rewrite_all`] critical section, so a
//! scan's decision and the check it records can never interleave with
//! another writer.
//!
//! Predicates operate on the *current* record of a pass id: the ACTIVE row
//! with the latest `createdAt` (see [`current_index`]).

pub mod rules;

use crate::error::{StorageError, StorageResult};
use crate::models::special_pass::{current_index, select_latest};
use crate::models::{
    CheckTimes, Checked, Expiring, PassHolder, SpecialPassRecord, VisitorRegistration,
};
use crate::store::{Document, FlatFileStore};
use checkpoint_core::{CheckStatus, CheckType, Clock, CredentialId, PersonRecord, RecordStatus, Role};
use chrono::NaiveDateTime;
use rules::{PassAction, PassFacts};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a Special Pass scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassVerdict {
    /// Check recorded
    Checked {
        person: PersonRecord,
        check: CheckType,
        grace: bool,
    },
    /// Denied with "Deactivated Pass"; nothing written
    Deactivated { person: PersonRecord },
}

/// Special Pass state machine over the visitor file
pub struct SpecialPassLifecycle {
    store: Arc<FlatFileStore>,
    clock: Arc<dyn Clock>,
}

impl SpecialPassLifecycle {
    pub fn new(store: Arc<FlatFileStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    async fn current(&self, id: &CredentialId) -> StorageResult<Option<SpecialPassRecord>> {
        let mut records = self.store.load_all::<SpecialPassRecord>().await?;
        Ok(current_index(&records, id).map(|index| records.swap_remove(index)))
    }

    /// Whether the roster holds `id` as a disabled Special Pass.
    async fn is_disabled_in_roster(&self, id: &CredentialId) -> StorageResult<bool> {
        let roster = self.store.load::<PersonRecord>().await?;
        Ok(roster
            .records()
            .any(|p| p.id == *id && p.role == Role::Special && !p.is_active()))
    }

    /// Derived check state; `CheckedOut` when no ACTIVE record exists.
    pub async fn check_status(&self, id: &CredentialId) -> StorageResult<CheckStatus> {
        Ok(self
            .current(id)
            .await?
            .map(|record| record.check_status())
            .unwrap_or_default())
    }

    pub async fn check_times(&self, id: &CredentialId) -> StorageResult<CheckTimes> {
        Ok(self
            .current(id)
            .await?
            .map(|record| record.check_times())
            .unwrap_or_default())
    }

    /// Past expiry, no grace. Gates new check-ins only.
    pub async fn is_expired_for_check_in(&self, id: &CredentialId) -> StorageResult<bool> {
        let now = self.now();
        Ok(self
            .current(id)
            .await?
            .is_some_and(|record| record.is_expired_at(now)))
    }

    /// Checked in late enough that a check-out after expiry is allowed.
    pub async fn is_in_grace_period(&self, id: &CredentialId) -> StorageResult<bool> {
        let now = self.now();
        Ok(self.current(id).await?.is_some_and(|record| {
            record.check_status() == CheckStatus::CheckedIn && record.is_in_grace_period(now)
        }))
    }

    /// Past expiry regardless of check state, or disabled in the roster.
    pub async fn is_expired(&self, id: &CredentialId) -> StorageResult<bool> {
        if self.is_disabled_in_roster(id).await? {
            return Ok(true);
        }
        let now = self.now();
        Ok(self
            .current(id)
            .await?
            .is_some_and(|record| record.is_expired_at(now)))
    }

    /// Whether any ACTIVE registration exists for `id`, live or not.
    pub async fn has_active_record(&self, id: &CredentialId) -> StorageResult<bool> {
        Ok(self.current(id).await?.is_some())
    }

    /// Holder of a live registration for `id`, if any.
    pub async fn in_use_by(&self, id: &CredentialId) -> StorageResult<Option<PassHolder>> {
        let now = self.now();
        let records = self.store.load_all::<SpecialPassRecord>().await?;
        Ok(live_index(&records, id, now).map(|index| records[index].holder()))
    }

    /// Purge then check that no live registration holds `id`.
    pub async fn is_available_for_registration(&self, id: &CredentialId) -> StorageResult<bool> {
        self.cleanup_expired().await?;
        Ok(self.in_use_by(id).await?.is_none())
    }

    /// Record a check on the current record. Returns whether a row changed.
    pub async fn record_check(&self, id: &CredentialId, check: CheckType) -> StorageResult<bool> {
        let now = self.now();
        let updated = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                match current_index(doc.records(), id).and_then(|index| doc.record_mut(index)) {
                    Some(record) => {
                        record.apply_check(check, now);
                        true
                    }
                    None => false,
                }
            })
            .await?;

        if updated {
            info!(pass = %id, check = %check, "Recorded Special Pass check");
        } else {
            debug!(pass = %id, check = %check, "No active Special Pass to record check on");
        }
        Ok(updated)
    }

    /// Create a registration from roster data unless an ACTIVE one exists.
    /// Returns whether a row was added.
    pub async fn ensure_record(&self, id: &CredentialId, person: &PersonRecord) -> StorageResult<bool> {
        let now = self.now();
        let created = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                if current_index(doc.records(), id).is_some() {
                    return false;
                }
                doc.push(SpecialPassRecord::from_roster(id.clone(), person, now));
                true
            })
            .await?;

        if created {
            info!(pass = %id, name = %person.name, "Created Special Pass record from roster");
        }
        Ok(created)
    }

    /// Flip every ACTIVE registration of `id` to INACTIVE.
    pub async fn deactivate_existing(&self, id: &CredentialId) -> StorageResult<usize> {
        let count = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| deactivate_in(doc, id))
            .await?;

        if count > 0 {
            info!(pass = %id, count, "Deactivated superseded Special Pass records");
        }
        Ok(count)
    }

    /// Supersede any ACTIVE registration of the same id and append `record`.
    pub async fn add_visitor(&self, record: SpecialPassRecord) -> StorageResult<()> {
        let id = record.special_pass_id.clone();
        let name = record.name.clone();
        let superseded = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                let superseded = deactivate_in(doc, &id);
                doc.push(record);
                superseded
            })
            .await?;

        info!(pass = %id, %name, superseded, "Added visitor");
        Ok(())
    }

    /// Delete ACTIVE registrations more than an hour past expiry.
    pub async fn cleanup_expired(&self) -> StorageResult<usize> {
        let now = self.now();
        let removed = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                doc.retain(|record| !record.is_due_for_cleanup(now))
            })
            .await?;

        if removed > 0 {
            info!(removed, "Cleaned up expired Special Passes");
        }
        Ok(removed)
    }

    /// Register a visitor from the guard desk form.
    ///
    /// # Errors
    /// `MissingField` or `Validation` for a bad form, `PassInUse` when a live
    /// registration already holds the pass id.
    pub async fn register(&self, form: &VisitorRegistration) -> StorageResult<SpecialPassRecord> {
        let id = form.validate()?;
        self.cleanup_expired().await?;

        let now = self.now();
        let record = SpecialPassRecord::from_registration(form, id.clone(), now);
        let stored = record.clone();

        self.store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                let held = live_index(doc.records(), &id, now)
                    .and_then(|index| doc.records().nth(index))
                    .map(SpecialPassRecord::holder);
                if let Some(holder) = held {
                    return Err(StorageError::PassInUse {
                        holder: holder.name,
                        expires_at: holder.expires_at,
                    });
                }
                deactivate_in(doc, &id);
                doc.push(stored);
                Ok(())
            })
            .await??;

        info!(pass = %id, name = %record.name, expires_at = %record.expires_at, "Registered visitor");
        Ok(record)
    }

    /// Decide and record a scan of a Special Pass.
    ///
    /// `person` is the roster entry for the id, if any; it seeds a record on
    /// the first scan of a roster-only pass. Returns `None` when neither a
    /// roster entry nor an ACTIVE registration exists.
    pub async fn scan(
        &self,
        id: &CredentialId,
        person: Option<&PersonRecord>,
    ) -> StorageResult<Option<PassVerdict>> {
        let disabled = self.is_disabled_in_roster(id).await?;
        let now = self.now();

        let verdict = self
            .store
            .rewrite_all(|doc: &mut Document<SpecialPassRecord>| {
                decide_scan(doc, id, person, disabled, now)
            })
            .await?;

        match &verdict {
            Some(PassVerdict::Checked { check, grace, .. }) => {
                info!(pass = %id, check = %check, grace, "Special Pass scan allowed");
            }
            Some(PassVerdict::Deactivated { .. }) => {
                info!(pass = %id, "Special Pass scan rejected: deactivated");
            }
            None => debug!(pass = %id, "No Special Pass for scan"),
        }
        Ok(verdict)
    }
}

/// Index of the freshest live registration for `id`.
fn live_index<'a>(
    records: impl IntoIterator<Item = &'a SpecialPassRecord>,
    id: &CredentialId,
    now: NaiveDateTime,
) -> Option<usize> {
    select_latest(records, id, |record| record.is_live_at(now))
}

fn deactivate_in(doc: &mut Document<SpecialPassRecord>, id: &CredentialId) -> usize {
    let targets = doc
        .records()
        .filter(|record| record.is_for(id) && record.status.is_active())
        .count();
    if targets == 0 {
        return 0;
    }

    for record in doc.records_mut() {
        if record.is_for(id) && record.status.is_active() {
            record.status = RecordStatus::Inactive;
        }
    }
    targets
}

fn decide_scan(
    doc: &mut Document<SpecialPassRecord>,
    id: &CredentialId,
    person: Option<&PersonRecord>,
    disabled: bool,
    now: NaiveDateTime,
) -> Option<PassVerdict> {
    let current = current_index(doc.records(), id);
    let facts = {
        let record = current.and_then(|index| doc.records().nth(index));
        PassFacts::gather(record, disabled, now)
    };
    let action = rules::decide(&facts);

    if action == PassAction::RejectDeactivated {
        return subject(doc, current, person).map(|person| PassVerdict::Deactivated { person });
    }

    let index = match current {
        Some(index) => index,
        None => {
            let roster = person?;
            doc.push(SpecialPassRecord::from_roster(id.clone(), roster, now));
            doc.record_count() - 1
        }
    };

    let check = rules::transition(action, facts.state)?;
    if let Some(record) = doc.record_mut(index) {
        record.apply_check(check, now);
    }

    subject(doc, Some(index), person).map(|person| PassVerdict::Checked {
        person,
        check,
        grace: action == PassAction::GraceCheckOut,
    })
}

/// Person a verdict is about: the registration if there is one, else the
/// roster entry.
fn subject(
    doc: &Document<SpecialPassRecord>,
    index: Option<usize>,
    roster: Option<&PersonRecord>,
) -> Option<PersonRecord> {
    index
        .and_then(|index| doc.records().nth(index))
        .map(SpecialPassRecord::to_person)
        .or_else(|| roster.cloned())
}
