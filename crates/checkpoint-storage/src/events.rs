//! Event channels between the checkpoint and its observers.
//!
//! Two streams leave the core:
//!
//! - [`ScanEvent`]: one per guard scan, for display surfaces. This replaces
//!   polling a shared status file.
//! - [`StorageFault`]: one per degraded operation or corrupt row, so storage
//!   trouble that the fail-open policy hides from callers stays observable.
//!   [`FaultCounts`] keeps running totals for metrics scrapers.
//!
//! Both are `tokio::sync::broadcast` channels: slow subscribers lose the
//! oldest events rather than stalling the scan path.

use crate::scan::ScanOutcome;
use crate::store::RecordKind;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Published after every guard scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    pub event_id: Uuid,
    pub scanned_at: NaiveDateTime,
    /// Raw text as scanned
    pub credential: String,
    pub outcome: ScanOutcome,
    pub display_message: &'static str,
}

impl ScanEvent {
    pub fn new(scanned_at: NaiveDateTime, credential: &str, outcome: ScanOutcome) -> Self {
        let display_message = outcome.display_message();
        Self {
            event_id: Uuid::new_v4(),
            scanned_at,
            credential: credential.to_string(),
            outcome,
            display_message,
        }
    }
}

/// Category of a storage fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// A row could not be parsed and was kept verbatim
    MalformedRow,
    /// A row parsed but carries a timestamp that does not
    InvalidTimestamp,
    /// An operation failed and the caller got a safe default
    OperationFailed,
    /// An access log line could not be written
    LogWriteFailed,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FaultKind::MalformedRow => "malformed_row",
            FaultKind::InvalidTimestamp => "invalid_timestamp",
            FaultKind::OperationFailed => "operation_failed",
            FaultKind::LogWriteFailed => "log_write_failed",
        };
        f.write_str(name)
    }
}

/// A storage problem the caller did not see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageFault {
    pub kind: FaultKind,
    pub file: Option<RecordKind>,
    pub detail: String,
}

impl StorageFault {
    pub fn new(kind: FaultKind, file: Option<RecordKind>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            file,
            detail: detail.into(),
        }
    }
}

/// Snapshot of fault totals since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultCounts {
    pub malformed_rows: u64,
    pub invalid_timestamps: u64,
    pub failed_operations: u64,
    pub failed_log_writes: u64,
}

impl FaultCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.malformed_rows + self.invalid_timestamps + self.failed_operations + self.failed_log_writes
    }
}

#[derive(Debug, Default)]
struct FaultCounters {
    malformed_rows: AtomicU64,
    invalid_timestamps: AtomicU64,
    failed_operations: AtomicU64,
    failed_log_writes: AtomicU64,
}

/// Shared sender for [`StorageFault`]s plus running counters
#[derive(Debug, Clone)]
pub struct FaultChannel {
    sender: broadcast::Sender<StorageFault>,
    counters: Arc<FaultCounters>,
}

impl FaultChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counters: Arc::new(FaultCounters::default()),
        }
    }

    /// Log, count and publish a fault.
    pub fn report(&self, fault: StorageFault) {
        let counter = match fault.kind {
            FaultKind::MalformedRow => &self.counters.malformed_rows,
            FaultKind::InvalidTimestamp => &self.counters.invalid_timestamps,
            FaultKind::OperationFailed => &self.counters.failed_operations,
            FaultKind::LogWriteFailed => &self.counters.failed_log_writes,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match fault.file {
            Some(file) => warn!(kind = %fault.kind, %file, "{}", fault.detail),
            None => warn!(kind = %fault.kind, "{}", fault.detail),
        }

        // No subscribers is fine
        let _ = self.sender.send(fault);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageFault> {
        self.sender.subscribe()
    }

    pub fn counts(&self) -> FaultCounts {
        FaultCounts {
            malformed_rows: self.counters.malformed_rows.load(Ordering::Relaxed),
            invalid_timestamps: self.counters.invalid_timestamps.load(Ordering::Relaxed),
            failed_operations: self.counters.failed_operations.load(Ordering::Relaxed),
            failed_log_writes: self.counters.failed_log_writes.load(Ordering::Relaxed),
        }
    }
}

impl Default for FaultChannel {
    fn default() -> Self {
        Self::new(64)
    }
}
