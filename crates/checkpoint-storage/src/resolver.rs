use crate::error::StorageResult;
use crate::models::special_pass::select_latest;
use crate::models::{Expiring, SpecialPassRecord};
use crate::store::FlatFileStore;
use checkpoint_core::constants::UNKNOWN_GUARD_NAME;
use checkpoint_core::{Clock, CredentialId, PersonRecord, RecordStatus, Role};
use std::sync::Arc;

/// Identity lookup over the visitor file and the roster
///
/// # Search Order
///
/// 1. Live Special Pass registrations for the id, freshest first, surfaced
///    as role SPECIAL.
/// 2. The roster row with the exact id, whatever its status. Callers need
///    to see INACTIVE rows to report a deactivated credential. A person row
///    wins over a student number mapping row with the same id, wherever
///    each sits in the file.
pub struct PersonResolver {
    store: Arc<FlatFileStore>,
    clock: Arc<dyn Clock>,
}

impl PersonResolver {
    pub fn new(store: Arc<FlatFileStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn find(&self, id: &CredentialId) -> StorageResult<Option<PersonRecord>> {
        let now = self.clock.now();
        let visitors = self.store.load_all::<SpecialPassRecord>().await?;
        if let Some(index) = select_latest(&visitors, id, |record| record.is_live_at(now)) {
            return Ok(Some(visitors[index].to_person()));
        }

        self.roster_entry(id).await
    }

    /// Roster row with the exact id, whatever its status. Mapping rows are
    /// only returned when no person row has the id.
    pub async fn roster_entry(&self, id: &CredentialId) -> StorageResult<Option<PersonRecord>> {
        let roster = self.store.load_all::<PersonRecord>().await?;
        let (people, mappings): (Vec<_>, Vec<_>) = roster
            .into_iter()
            .filter(|row| row.id == *id)
            .partition(|row| !row.role.is_mapping());

        Ok(people.into_iter().next().or_else(|| mappings.into_iter().next()))
    }

    /// Whether `number` is an ACTIVE student number.
    pub async fn is_student_number_valid(&self, number: &CredentialId) -> StorageResult<bool> {
        let roster = self.store.load_all::<PersonRecord>().await?;
        Ok(student_number_row(&roster, number).is_some())
    }

    /// Resolve a typed student number to the student's RFID identity.
    ///
    /// Joins the ACTIVE `STUDENT_NUMBER` row (which carries the name) with
    /// the ACTIVE `STUDENT_RFID` row mapping an RFID id to that number.
    pub async fn person_by_student_number(
        &self,
        number: &CredentialId,
    ) -> StorageResult<Option<PersonRecord>> {
        let roster = self.store.load_all::<PersonRecord>().await?;
        let Some(student) = student_number_row(&roster, number) else {
            return Ok(None);
        };

        let rfid = roster.iter().find(|row| {
            row.role == Role::StudentRfid && row.is_active() && number.matches(&row.name)
        });

        Ok(rfid.map(|mapping| {
            PersonRecord::new(mapping.id.clone(), Role::Student, student.name.clone())
                .with_status(RecordStatus::Active)
        }))
    }

    /// Guard's name, or "Unknown Guard" when `id` is not a guard.
    pub async fn guard_name(&self, id: &CredentialId) -> StorageResult<String> {
        Ok(match self.find(id).await? {
            Some(person) if person.role == Role::Guard => person.name,
            _ => UNKNOWN_GUARD_NAME.to_string(),
        })
    }
}

fn student_number_row<'a>(roster: &'a [PersonRecord], number: &CredentialId) -> Option<&'a PersonRecord> {
    roster
        .iter()
        .find(|row| row.role == Role::StudentNumber && row.is_active() && row.id == *number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::events::FaultChannel;
    use crate::models::VisitorRegistration;
    use crate::store::RecordKind;
    use checkpoint_core::ManualClock;
    use checkpoint_core::timestamp::parse_timestamp;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    const ROSTER: &str = "\
# id,role,name,status
G001,GUARD,Juan Cruz,ACTIVE
0012345678,STUDENT,Jane Doe,ACTIVE
0099999999,STUDENT,Old Student,INACTIVE
T100,TEACHER,Ana Reyes
5551234567,SPECIAL,Special Pass 1,ACTIVE
2021-00123,STUDENT_NUMBER,Jane Doe,ACTIVE
0012345678,STUDENT_RFID,2021-00123,ACTIVE
2019-00001,STUDENT_NUMBER,Old Student,INACTIVE
0099999999,STUDENT_RFID,2019-00001,ACTIVE
2022-00456,STUDENT_NUMBER,Unmapped Student,ACTIVE
";

    async fn resolver() -> (TempDir, Arc<FlatFileStore>, Arc<ManualClock>, PersonResolver) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            FlatFileStore::open(StoreConfig::new(dir.path()), FaultChannel::new(16))
                .await
                .unwrap(),
        );
        std::fs::write(store.path(RecordKind::Roster), ROSTER).unwrap();
        let clock = Arc::new(ManualClock::new(parse_timestamp("2025-03-14 09:00:00").unwrap()));
        let resolver = PersonResolver::new(store.clone(), clock.clone());
        (dir, store, clock, resolver)
    }

    fn id(value: &str) -> CredentialId {
        CredentialId::new(value).unwrap()
    }

    fn visitor(created: &str) -> SpecialPassRecord {
        let form = VisitorRegistration {
            name: "Maria Santos".to_string(),
            contact: "0917".to_string(),
            visiting_as: "Parent".to_string(),
            purpose: "Enrollment".to_string(),
            visiting: "Registrar".to_string(),
            id_type: "ID".to_string(),
            special_pass_id: "5551234567".to_string(),
        };
        SpecialPassRecord::from_registration(&form, id("5551234567"), parse_timestamp(created).unwrap())
    }

    #[tokio::test]
    async fn test_find_roster_person() {
        let (_dir, _store, _clock, resolver) = resolver().await;

        let person = resolver.find(&id("0012345678")).await.unwrap().unwrap();
        assert_eq!(person.role, Role::Student);
        assert_eq!(person.name, "Jane Doe");

        let teacher = resolver.find(&id("T100")).await.unwrap().unwrap();
        assert_eq!(teacher.status, RecordStatus::Active);
    }

    #[tokio::test]
    async fn test_person_row_wins_over_earlier_mapping_row() {
        let (_dir, store, _clock, resolver) = resolver().await;
        std::fs::write(
            store.path(RecordKind::Roster),
            "2021-00777,STUDENT_NUMBER,Lea Cruz,ACTIVE\n\
             0077777777,STUDENT_RFID,2021-00777,ACTIVE\n\
             0077777777,STUDENT,Lea Cruz,ACTIVE\n",
        )
        .unwrap();

        let person = resolver.find(&id("0077777777")).await.unwrap().unwrap();
        assert_eq!(person.role, Role::Student);
        assert_eq!(person.name, "Lea Cruz");

        // Only a mapping row carries the id
        let mapping = resolver.find(&id("2021-00777")).await.unwrap().unwrap();
        assert_eq!(mapping.role, Role::StudentNumber);
    }

    #[tokio::test]
    async fn test_find_returns_inactive_rows() {
        let (_dir, _store, _clock, resolver) = resolver().await;
        let person = resolver.find(&id("0099999999")).await.unwrap().unwrap();
        assert_eq!(person.status, RecordStatus::Inactive);
    }

    #[tokio::test]
    async fn test_find_unknown() {
        let (_dir, _store, _clock, resolver) = resolver().await;
        assert!(resolver.find(&id("424242")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_live_visitor_shadows_roster() {
        let (_dir, store, _clock, resolver) = resolver().await;
        store.append(&visitor("2025-03-14 08:00:00")).await.unwrap();

        let person = resolver.find(&id("5551234567")).await.unwrap().unwrap();
        assert_eq!(person.role, Role::Special);
        assert_eq!(person.name, "Maria Santos");
    }

    #[tokio::test]
    async fn test_expired_visitor_falls_back_to_roster() {
        let (_dir, store, clock, resolver) = resolver().await;
        store.append(&visitor("2025-03-14 08:00:00")).await.unwrap();

        clock.advance(TimeDelta::days(1));
        let person = resolver.find(&id("5551234567")).await.unwrap().unwrap();
        assert_eq!(person.name, "Special Pass 1");
    }

    #[tokio::test]
    async fn test_freshest_duplicate_wins() {
        let (_dir, store, _clock, resolver) = resolver().await;
        let mut newer = visitor("2025-03-14 08:30:00");
        newer.name = "Pedro Reyes".to_string();
        store.append(&newer).await.unwrap();
        store.append(&visitor("2025-03-14 08:00:00")).await.unwrap();

        let person = resolver.find(&id("5551234567")).await.unwrap().unwrap();
        assert_eq!(person.name, "Pedro Reyes");
    }

    #[tokio::test]
    async fn test_student_number_lookup() {
        let (_dir, _store, _clock, resolver) = resolver().await;

        assert!(resolver.is_student_number_valid(&id("2021-00123")).await.unwrap());
        let person = resolver
            .person_by_student_number(&id("2021-00123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(person.id.as_str(), "0012345678");
        assert_eq!(person.role, Role::Student);
        assert_eq!(person.name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_inactive_student_number_does_not_resolve() {
        let (_dir, _store, _clock, resolver) = resolver().await;
        assert!(!resolver.is_student_number_valid(&id("2019-00001")).await.unwrap());
        assert!(resolver.person_by_student_number(&id("2019-00001")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unmapped_student_number() {
        let (_dir, _store, _clock, resolver) = resolver().await;
        assert!(resolver.is_student_number_valid(&id("2022-00456")).await.unwrap());
        assert!(resolver.person_by_student_number(&id("2022-00456")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guard_name() {
        let (_dir, _store, _clock, resolver) = resolver().await;
        assert_eq!(resolver.guard_name(&id("G001")).await.unwrap(), "Juan Cruz");
        assert_eq!(resolver.guard_name(&id("T100")).await.unwrap(), "Unknown Guard");
        assert_eq!(resolver.guard_name(&id("nobody")).await.unwrap(), "Unknown Guard");
    }
}
