use crate::error::StorageResult;
use crate::events::{FaultKind, StorageFault};
use crate::models::AccessLogEntry;
use crate::store::{FlatFileStore, RecordKind};
use checkpoint_core::Clock;
use std::sync::Arc;
use tracing::debug;

/// Append-only access log
///
/// Writing never fails from the caller's point of view: a failed append is
/// reported on the fault channel and the scan carries on.
pub struct AccessLogger {
    store: Arc<FlatFileStore>,
    clock: Arc<dyn Clock>,
}

impl AccessLogger {
    pub fn new(store: Arc<FlatFileStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append `timestamp,id,action,status`.
    pub async fn log(&self, id: &str, action: &str, status: &str) {
        let entry = AccessLogEntry::new(self.clock.now(), id, action, status);

        match self.store.append(&entry).await {
            Ok(()) => debug!(id = %entry.id, action = %entry.action, status = %entry.status, "Logged access"),
            Err(e) => self.store.faults().report(StorageFault::new(
                FaultKind::LogWriteFailed,
                Some(RecordKind::AccessLog),
                format!("{} {} {}: {e}", entry.id, entry.action, entry.status),
            )),
        }
    }

    /// Newest entries first, at most `limit`.
    pub async fn recent(&self, limit: usize) -> StorageResult<Vec<AccessLogEntry>> {
        let mut entries = self.store.load_all::<AccessLogEntry>().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}
