use crate::error::StorageResult;
use crate::models::ViolationRecord;
use crate::store::{Document, FlatFileStore};
use checkpoint_core::CredentialId;
use std::sync::Arc;
use tracing::info;

/// Per-person uniform violation counters
///
/// Counts only ever increase. A row whose count does not parse is kept in
/// the file untouched and does not contribute.
pub struct ViolationLedger {
    store: Arc<FlatFileStore>,
}

impl ViolationLedger {
    pub fn new(store: Arc<FlatFileStore>) -> Self {
        Self { store }
    }

    /// Current count, 0 when the person has none.
    pub async fn count(&self, person_id: &CredentialId) -> StorageResult<u32> {
        let records = self.store.load_all::<ViolationRecord>().await?;
        Ok(records
            .iter()
            .find(|record| record.person_id == *person_id)
            .map_or(0, |record| record.count))
    }

    /// Add one violation and return the new count.
    pub async fn add(&self, person_id: &CredentialId) -> StorageResult<u32> {
        let count = self
            .store
            .rewrite_all(|doc: &mut Document<ViolationRecord>| {
                let existing = doc
                    .records()
                    .position(|record| record.person_id == *person_id);
                match existing.and_then(|index| doc.record_mut(index)) {
                    Some(record) => {
                        record.count = record.count.saturating_add(1);
                        record.count
                    }
                    None => {
                        doc.push(ViolationRecord::first(person_id.clone()));
                        1
                    }
                }
            })
            .await?;

        info!(person = %person_id, count, "Recorded violation");
        Ok(count)
    }
}
