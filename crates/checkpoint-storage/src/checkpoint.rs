//! Checkpoint facade
//!
//! [`Checkpoint`] is what the kiosk, the registration desk and the uniform
//! verifier talk to. It wires the components over one shared
//! [`FlatFileStore`] and applies the fail-open policy: a storage failure
//! never reaches the caller as an error. Lookups degrade to "not found",
//! predicates to `false` and counts to `0`, and the failure is reported on
//! the [`FaultChannel`] instead.
//!
//! The exception is [`Checkpoint::register_visitor`], whose refusals the
//! registration desk has to explain.
//!
//! # Examples
//!
//! ```no_run
//! use checkpoint_storage::{Checkpoint, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checkpoint = Checkpoint::open(StoreConfig::new("/var/lib/checkpoint")).await?;
//! let mut events = checkpoint.subscribe();
//!
//! let outcome = checkpoint.scan("5551234567").await;
//! println!("{}", outcome.display_message());
//!
//! let event = events.recv().await?;
//! assert_eq!(event.credential, "5551234567");
//! # Ok(())
//! # }
//! ```

use crate::attendance::AttendanceTracker;
use crate::config::StoreConfig;
use crate::error::StorageResult;
use crate::events::{FaultChannel, FaultKind, ScanEvent, StorageFault};
use crate::ledger::ViolationLedger;
use crate::lifecycle::{PassVerdict, SpecialPassLifecycle};
use crate::logger::AccessLogger;
use crate::models::{AccessLogEntry, CheckTimes, PassHolder, SpecialPassRecord, VisitorRegistration};
use crate::resolver::PersonResolver;
use crate::scan::ScanOutcome;
use crate::store::FlatFileStore;
use checkpoint_core::constants::{DEFAULT_LOG_STATUS, UNKNOWN_GUARD_NAME};
use checkpoint_core::{CheckStatus, CheckType, Clock, CredentialId, PersonRecord, Role, SystemClock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Access-control core of one checkpoint
pub struct Checkpoint {
    store: Arc<FlatFileStore>,
    clock: Arc<dyn Clock>,
    resolver: PersonResolver,
    lifecycle: SpecialPassLifecycle,
    ledger: ViolationLedger,
    logger: AccessLogger,
    attendance: AttendanceTracker,
    events: broadcast::Sender<ScanEvent>,
}

impl Checkpoint {
    /// Open the store on the wall clock.
    pub async fn open(config: StoreConfig) -> StorageResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open the store, then purge stale Special Pass registrations.
    ///
    /// # Errors
    /// Only opening the store can fail; the startup cleanup degrades like
    /// any other operation.
    pub async fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let capacity = config.event_capacity;
        let data_dir = config.data_dir.clone();
        let store = Arc::new(FlatFileStore::open(config, FaultChannel::new(capacity)).await?);
        let (events, _) = broadcast::channel(capacity);

        let checkpoint = Self {
            resolver: PersonResolver::new(store.clone(), clock.clone()),
            lifecycle: SpecialPassLifecycle::new(store.clone(), clock.clone()),
            ledger: ViolationLedger::new(store.clone()),
            logger: AccessLogger::new(store.clone(), clock.clone()),
            attendance: AttendanceTracker::new(store.clone(), clock.clone()),
            store,
            clock,
            events,
        };

        let removed = checkpoint.cleanup_expired_special_passes().await;
        info!(data_dir = %data_dir.display(), removed, "Checkpoint ready");
        Ok(checkpoint)
    }

    pub fn config(&self) -> &StoreConfig {
        self.store.config()
    }

    /// Fault events and counters
    pub fn faults(&self) -> &FaultChannel {
        self.store.faults()
    }

    /// Scan events, one per [`scan`](Self::scan).
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Guard scan
    // ------------------------------------------------------------------

    /// Process a guard card scan.
    ///
    /// Logs the scan, purges stale registrations, resolves the id and, for a
    /// Special Pass, runs the check-in/check-out decision. The outcome is
    /// logged and published as a [`ScanEvent`].
    pub async fn scan(&self, raw: &str) -> ScanOutcome {
        self.logger.log(raw, "GUARD_CARD_SCAN", DEFAULT_LOG_STATUS).await;

        let outcome = match CredentialId::new(raw) {
            Ok(id) => self.decide(&id).await.unwrap_or_else(|e| {
                self.report("scan", &e);
                ScanOutcome::Unavailable
            }),
            Err(e) => {
                debug!(credential = raw, error = %e, "Scanned text is not a credential");
                ScanOutcome::Unknown
            }
        };

        if let Some((action, status)) = outcome.log_entry() {
            self.logger.log(raw, &action, status).await;
        }

        info!(
            credential = raw,
            granted = outcome.is_granted(),
            message = outcome.display_message(),
            "Scan processed"
        );

        // No subscribers is fine
        let _ = self
            .events
            .send(ScanEvent::new(self.clock.now(), raw, outcome.clone()));
        outcome
    }

    async fn decide(&self, id: &CredentialId) -> StorageResult<ScanOutcome> {
        if let Err(e) = self.lifecycle.cleanup_expired().await {
            self.report("cleanup before scan", &e);
        }

        let outcome = match self.resolver.find(id).await? {
            Some(person) if person.role == Role::Special => {
                let verdict = self.lifecycle.scan(id, Some(&person)).await?;
                verdict.map_or(ScanOutcome::Unknown, ScanOutcome::from)
            }
            Some(person) if person.role.is_student_or_teacher() => {
                if person.is_active() {
                    ScanOutcome::Admitted { person }
                } else {
                    ScanOutcome::Deactivated { person }
                }
            }
            // Student number rows map ids, they are not people
            Some(person) if person.role.is_mapping() => ScanOutcome::Unknown,
            Some(person) => ScanOutcome::Recognized { person },
            // An expired registration is still a Special Pass
            None => self
                .lifecycle
                .scan(id, None)
                .await?
                .map_or(ScanOutcome::Unknown, ScanOutcome::from),
        };

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub async fn find_person(&self, id: &str) -> Option<PersonRecord> {
        let id = credential(id)?;
        self.degrade("find_person", self.resolver.find(&id).await)
    }

    pub async fn is_student_number_valid(&self, number: &str) -> bool {
        let Some(number) = credential(number) else {
            return false;
        };
        self.degrade(
            "is_student_number_valid",
            self.resolver.is_student_number_valid(&number).await,
        )
    }

    pub async fn get_person_by_student_number(&self, number: &str) -> Option<PersonRecord> {
        let number = credential(number)?;
        self.degrade(
            "get_person_by_student_number",
            self.resolver.person_by_student_number(&number).await,
        )
    }

    pub async fn guard_name(&self, id: &str) -> String {
        let Some(id) = credential(id) else {
            return UNKNOWN_GUARD_NAME.to_string();
        };
        match self.resolver.guard_name(&id).await {
            Ok(name) => name,
            Err(e) => {
                self.report("guard_name", &e);
                UNKNOWN_GUARD_NAME.to_string()
            }
        }
    }

    // ------------------------------------------------------------------
    // Access log
    // ------------------------------------------------------------------

    /// Log with status `SUCCESS`.
    pub async fn log_access(&self, id: &str, action: &str) {
        self.logger.log(id, action, DEFAULT_LOG_STATUS).await;
    }

    pub async fn log_access_with_status(&self, id: &str, action: &str, status: &str) {
        self.logger.log(id, action, status).await;
    }

    /// Newest access log entries first.
    pub async fn recent_access(&self, limit: usize) -> Vec<AccessLogEntry> {
        self.degrade("recent_access", self.logger.recent(limit).await)
    }

    // ------------------------------------------------------------------
    // Special Pass lifecycle
    // ------------------------------------------------------------------

    pub async fn record_special_pass_check(&self, id: &str, check: CheckType) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade(
            "record_special_pass_check",
            self.lifecycle.record_check(&id, check).await,
        )
    }

    pub async fn get_special_pass_check_status(&self, id: &str) -> CheckStatus {
        let Some(id) = credential(id) else {
            return CheckStatus::default();
        };
        self.degrade(
            "get_special_pass_check_status",
            self.lifecycle.check_status(&id).await,
        )
    }

    pub async fn get_special_pass_check_times(&self, id: &str) -> CheckTimes {
        let Some(id) = credential(id) else {
            return CheckTimes::default();
        };
        self.degrade(
            "get_special_pass_check_times",
            self.lifecycle.check_times(&id).await,
        )
    }

    pub async fn is_special_pass_expired(&self, id: &str) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade("is_special_pass_expired", self.lifecycle.is_expired(&id).await)
    }

    pub async fn is_special_pass_expired_for_checkin(&self, id: &str) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade(
            "is_special_pass_expired_for_checkin",
            self.lifecycle.is_expired_for_check_in(&id).await,
        )
    }

    pub async fn is_special_pass_in_grace_period(&self, id: &str) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade(
            "is_special_pass_in_grace_period",
            self.lifecycle.is_in_grace_period(&id).await,
        )
    }

    pub async fn ensure_special_pass_record(&self, id: &str, person: &PersonRecord) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade(
            "ensure_special_pass_record",
            self.lifecycle.ensure_record(&id, person).await,
        )
    }

    /// Purge stale registrations; returns how many were removed.
    pub async fn cleanup_expired_special_passes(&self) -> usize {
        self.degrade(
            "cleanup_expired_special_passes",
            self.lifecycle.cleanup_expired().await,
        )
    }

    /// Holder of a live registration for `id`, if any.
    pub async fn is_special_pass_in_use(&self, id: &str) -> Option<PassHolder> {
        let id = credential(id)?;
        self.degrade("is_special_pass_in_use", self.lifecycle.in_use_by(&id).await)
    }

    pub async fn is_special_pass_available_for_registration(&self, id: &str) -> bool {
        let Some(id) = credential(id) else {
            return false;
        };
        self.degrade(
            "is_special_pass_available_for_registration",
            self.lifecycle.is_available_for_registration(&id).await,
        )
    }

    /// Store a prepared registration, superseding older ones for the id.
    pub async fn add_visitor(&self, record: SpecialPassRecord) -> bool {
        match self.lifecycle.add_visitor(record).await {
            Ok(()) => true,
            Err(e) => {
                self.report("add_visitor", &e);
                false
            }
        }
    }

    /// Register a visitor from the guard desk form.
    ///
    /// # Errors
    /// `MissingField` / `Validation` for a bad form, `PassInUse` when the
    /// pass is held by a live registration, `Io` when the store fails.
    pub async fn register_visitor(
        &self,
        form: &VisitorRegistration,
    ) -> StorageResult<SpecialPassRecord> {
        self.lifecycle.register(form).await
    }

    // ------------------------------------------------------------------
    // Student and teacher attendance
    // ------------------------------------------------------------------

    pub async fn get_student_teacher_check_status(&self, card_id: &str) -> CheckStatus {
        let Some(id) = credential(card_id) else {
            return CheckStatus::default();
        };
        self.degrade(
            "get_student_teacher_check_status",
            self.attendance.check_status(&id).await,
        )
    }

    pub async fn get_student_teacher_check_times(&self, card_id: &str) -> CheckTimes {
        let Some(id) = credential(card_id) else {
            return CheckTimes::default();
        };
        self.degrade(
            "get_student_teacher_check_times",
            self.attendance.check_times(&id).await,
        )
    }

    /// Record a check for a rostered student or teacher, creating their
    /// attendance row on first use. `false` for anyone else.
    pub async fn record_student_teacher_check(&self, card_id: &str, check: CheckType) -> bool {
        let Some(id) = credential(card_id) else {
            return false;
        };
        let result = async {
            match self.resolver.roster_entry(&id).await? {
                Some(person) => self.attendance.record_check(&person, check).await,
                None => Ok(false),
            }
        };
        self.degrade("record_student_teacher_check", result.await)
    }

    /// Check a student or teacher in when they are out and out when they
    /// are in. Returns the check performed.
    pub async fn toggle_student_teacher_check(&self, card_id: &str) -> Option<CheckType> {
        let id = credential(card_id)?;
        let result = async {
            match self.resolver.roster_entry(&id).await? {
                Some(person) => self.attendance.toggle(&person).await,
                None => Ok(None),
            }
        };
        self.degrade("toggle_student_teacher_check", result.await)
    }

    // ------------------------------------------------------------------
    // Violations
    // ------------------------------------------------------------------

    /// Add one violation; returns the new count, 0 on failure.
    pub async fn add_violation(&self, person_id: &str) -> u32 {
        let Some(id) = credential(person_id) else {
            return 0;
        };
        self.degrade("add_violation", self.ledger.add(&id).await)
    }

    pub async fn get_violation_count(&self, person_id: &str) -> u32 {
        let Some(id) = credential(person_id) else {
            return 0;
        };
        self.degrade("get_violation_count", self.ledger.count(&id).await)
    }

    fn degrade<T: Default>(&self, operation: &str, result: StorageResult<T>) -> T {
        result.unwrap_or_else(|e| {
            self.report(operation, &e);
            T::default()
        })
    }

    fn report(&self, operation: &str, error: &crate::error::StorageError) {
        self.store.faults().report(StorageFault::new(
            FaultKind::OperationFailed,
            None,
            format!("{operation} failed: {error}"),
        ));
    }
}

impl From<PassVerdict> for ScanOutcome {
    fn from(verdict: PassVerdict) -> Self {
        match verdict {
            PassVerdict::Checked {
                person,
                check,
                grace,
            } => ScanOutcome::SpecialPass {
                person,
                check,
                grace,
            },
            PassVerdict::Deactivated { person } => ScanOutcome::Deactivated { person },
        }
    }
}

/// An id that is not a valid credential resolves to nothing.
fn credential(raw: &str) -> Option<CredentialId> {
    CredentialId::new(raw).ok()
}
