//! End-to-end checkpoint scenarios over real files
//!
//! Every test opens a [`Checkpoint`] on a fresh temporary directory and
//! drives time with a [`ManualClock`].
//!
//! Run with: cargo test --package checkpoint-storage --test checkpoint_scenarios

use checkpoint_core::timestamp::parse_timestamp;
use checkpoint_core::{CheckStatus, CheckType, Clock, ManualClock, RecordStatus, Role};
use checkpoint_storage::{
    Checkpoint, DisplayMessages, RecordKind, ScanOutcome, SpecialPassRecord, StorageError,
    StoreConfig, VisitorRegistration,
};
use chrono::{NaiveDateTime, TimeDelta};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const PASS: &str = "5551234567";

const ROSTER: &str = "\
# id,role,name,status
G001,GUARD,Juan Cruz,ACTIVE
0012345678,STUDENT,Jane Doe,ACTIVE
T100,TEACHER,Ana Reyes,INACTIVE
7770000001,SPECIAL,Special Pass 7,ACTIVE
7770000002,SPECIAL,Special Pass 8,INACTIVE
";

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    checkpoint: Checkpoint,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("database.txt"), ROSTER).unwrap();
        let clock = Arc::new(ManualClock::new(at("2025-03-14 09:00:00")));
        let checkpoint = Checkpoint::open_with_clock(StoreConfig::new(dir.path()), clock.clone())
            .await
            .unwrap();
        Self {
            dir,
            clock,
            checkpoint,
        }
    }

    fn path(&self, kind: RecordKind) -> PathBuf {
        StoreConfig::new(self.dir.path()).path_for(kind)
    }

    fn read(&self, kind: RecordKind) -> String {
        std::fs::read_to_string(self.path(kind)).unwrap()
    }

    fn set(&self, instant: &str) {
        self.clock.set(at(instant));
    }

    async fn register(&self, pass: &str, name: &str) -> Result<SpecialPassRecord, StorageError> {
        self.checkpoint.register_visitor(&form(pass, name)).await
    }
}

fn at(value: &str) -> NaiveDateTime {
    parse_timestamp(value).unwrap()
}

fn form(pass: &str, name: &str) -> VisitorRegistration {
    VisitorRegistration {
        name: name.to_string(),
        contact: "09171234567".to_string(),
        visiting_as: "Parent".to_string(),
        purpose: "Enrollment".to_string(),
        visiting: "Registrar".to_string(),
        id_type: "Driver's License".to_string(),
        special_pass_id: pass.to_string(),
    }
}

fn check_of(outcome: &ScanOutcome) -> Option<(CheckType, bool)> {
    match outcome {
        ScanOutcome::SpecialPass { check, grace, .. } => Some((*check, *grace)),
        _ => None,
    }
}

#[tokio::test]
async fn test_visitor_day_then_rejected_next_morning() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    h.set("2025-03-14 09:05:00");
    let outcome = h.checkpoint.scan(PASS).await;
    assert_eq!(check_of(&outcome), Some((CheckType::CheckIn, false)));
    assert_eq!(outcome.display_message(), DisplayMessages::SPECIAL_PASS_CHECKED_IN);

    h.set("2025-03-14 17:00:00");
    let outcome = h.checkpoint.scan(PASS).await;
    assert_eq!(check_of(&outcome), Some((CheckType::CheckOut, false)));

    let before = h.read(RecordKind::Visitors);
    h.set("2025-03-15 09:10:00");
    let outcome = h.checkpoint.scan(PASS).await;
    assert!(matches!(outcome, ScanOutcome::Deactivated { .. }));
    assert_eq!(outcome.display_message(), "Deactivated Pass");
    assert_eq!(h.read(RecordKind::Visitors), before);

    let log = h.read(RecordKind::AccessLog);
    assert!(log.contains("2025-03-14 09:05:00,5551234567,SPECIAL_PASS_CHECK_IN,SUCCESS"));
    assert!(log.contains("2025-03-14 17:00:00,5551234567,SPECIAL_PASS_CHECK_OUT,SUCCESS"));
    assert!(log.contains("2025-03-15 09:10:00,5551234567,SPECIAL_PASS_DEACTIVATED,DENIED"));
}

#[tokio::test]
async fn test_unused_pass_cannot_check_in_after_expiry() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    h.set("2025-03-15 09:00:01");
    assert!(h.checkpoint.is_special_pass_expired_for_checkin(PASS).await);
    let outcome = h.checkpoint.scan(PASS).await;
    assert!(matches!(outcome, ScanOutcome::Deactivated { .. }));
    assert_eq!(
        h.checkpoint.get_special_pass_check_status(PASS).await,
        CheckStatus::CheckedOut
    );
}

#[tokio::test]
async fn test_late_check_in_may_leave_after_expiry() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    h.set("2025-03-15 08:55:00");
    assert_eq!(check_of(&h.checkpoint.scan(PASS).await), Some((CheckType::CheckIn, false)));

    h.set("2025-03-15 09:05:00");
    assert!(h.checkpoint.is_special_pass_in_grace_period(PASS).await);
    let outcome = h.checkpoint.scan(PASS).await;
    assert_eq!(check_of(&outcome), Some((CheckType::CheckOut, true)));
    assert!(outcome.is_granted());
}

#[tokio::test]
async fn test_early_check_in_is_rejected_after_expiry() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    h.set("2025-03-15 08:40:00");
    h.checkpoint.scan(PASS).await;

    h.set("2025-03-15 09:05:00");
    assert!(!h.checkpoint.is_special_pass_in_grace_period(PASS).await);
    assert!(h.checkpoint.is_special_pass_expired(PASS).await);
    let outcome = h.checkpoint.scan(PASS).await;
    assert!(matches!(outcome, ScanOutcome::Deactivated { .. }));
}

#[tokio::test]
async fn test_check_status_sequence() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    assert_eq!(h.checkpoint.get_special_pass_check_status(PASS).await, CheckStatus::CheckedOut);
    assert!(h.checkpoint.record_special_pass_check(PASS, CheckType::CheckIn).await);
    assert_eq!(h.checkpoint.get_special_pass_check_status(PASS).await, CheckStatus::CheckedIn);

    h.clock.advance(TimeDelta::hours(1));
    assert!(h.checkpoint.record_special_pass_check(PASS, CheckType::CheckOut).await);
    assert_eq!(h.checkpoint.get_special_pass_check_status(PASS).await, CheckStatus::CheckedOut);

    let times = h.checkpoint.get_special_pass_check_times(PASS).await;
    assert_eq!(times.check_in, Some(at("2025-03-14 09:00:00")));
    assert_eq!(times.check_out, Some(at("2025-03-14 10:00:00")));
}

#[tokio::test]
async fn test_cleanup_removes_exactly_stale_active_rows() {
    let h = Harness::new().await;
    std::fs::write(
        h.path(RecordKind::Visitors),
        "\
# visitors
Stale,0917,Parent,Visit,Office,ID,1000000001,2025-03-13 07:00:00,2025-03-14 07:00:00,ACTIVE,,
Edge,0917,Parent,Visit,Office,ID,1000000002,2025-03-13 08:00:00,2025-03-14 08:00:00,ACTIVE,,
Expired,0917,Parent,Visit,Office,ID,1000000003,2025-03-13 08:30:00,2025-03-14 08:30:00,ACTIVE,,
Retired,0917,Parent,Visit,Office,ID,1000000004,2025-03-12 07:00:00,2025-03-13 07:00:00,INACTIVE,,
Live,0917,Parent,Visit,Office,ID,1000000005,2025-03-14 08:00:00,2025-03-15 08:00:00,ACTIVE,,
Garbled,0917,Parent,Visit,Office,ID,1000000006,2025-03-12 07:00:00,never,ACTIVE,,
",
    )
    .unwrap();

    assert_eq!(h.checkpoint.cleanup_expired_special_passes().await, 1);

    let text = h.read(RecordKind::Visitors);
    assert!(text.starts_with("# visitors\n"));
    assert!(!text.contains("Stale"));
    for kept in ["Edge", "Expired", "Retired", "Live", "Garbled"] {
        assert!(text.contains(kept), "{kept} should be kept");
    }
    assert!(h.checkpoint.faults().counts().invalid_timestamps >= 1);
}

#[tokio::test]
async fn test_startup_cleanup() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("visitors.txt"),
        "Stale,0917,Parent,Visit,Office,ID,1000000001,2025-03-13 07:00:00,2025-03-14 07:00:00,ACTIVE,,\n",
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(at("2025-03-14 09:00:00")));
    let _checkpoint = Checkpoint::open_with_clock(StoreConfig::new(dir.path()), clock)
        .await
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("visitors.txt")).unwrap();
    assert!(!text.contains("Stale"));
}

#[tokio::test]
async fn test_reregistration_keeps_one_active_row() {
    let h = Harness::new().await;
    h.register(PASS, "Maria Santos").await.unwrap();

    let refused = h.register(PASS, "Pedro Reyes").await.unwrap_err();
    assert!(matches!(refused, StorageError::PassInUse { .. }));
    let holder = h.checkpoint.is_special_pass_in_use(PASS).await.unwrap();
    assert_eq!(holder.name, "Maria Santos");
    assert!(!h.checkpoint.is_special_pass_available_for_registration(PASS).await);

    h.set("2025-03-15 09:30:00");
    assert!(h.checkpoint.is_special_pass_available_for_registration(PASS).await);
    h.register(PASS, "Pedro Reyes").await.unwrap();

    let active: Vec<_> = h
        .read(RecordKind::Visitors)
        .lines()
        .filter(|line| line.contains(PASS) && line.contains(",ACTIVE,"))
        .map(str::to_string)
        .collect();
    assert_eq!(active.len(), 1);
    assert!(active[0].starts_with("Pedro Reyes,"));

    let person = h.checkpoint.find_person(PASS).await.unwrap();
    assert_eq!(person.name, "Pedro Reyes");
}

#[tokio::test]
async fn test_find_prefers_fresher_duplicate() {
    let h = Harness::new().await;
    std::fs::write(
        h.path(RecordKind::Visitors),
        format!(
            "Fresh,0917,Parent,Visit,Office,ID,{PASS},2025-03-14 08:00:00,2025-03-15 08:00:00,ACTIVE,,\n\
             Stale,0917,Parent,Visit,Office,ID,{PASS},2025-03-14 06:00:00,2025-03-15 06:00:00,ACTIVE,,\n"
        ),
    )
    .unwrap();

    let person = h.checkpoint.find_person(PASS).await.unwrap();
    assert_eq!(person.name, "Fresh");
    assert_eq!(person.role, Role::Special);

    // The check lands on the fresh row too
    h.checkpoint.scan(PASS).await;
    let text = h.read(RecordKind::Visitors);
    let fresh = text.lines().find(|line| line.starts_with("Fresh")).unwrap();
    assert!(fresh.ends_with(",ACTIVE,2025-03-14 09:00:00,"));
}

#[tokio::test]
async fn test_roster_seeded_pass_first_scan_creates_record() {
    let h = Harness::new().await;

    let outcome = h.checkpoint.scan("7770000001").await;
    assert_eq!(check_of(&outcome), Some((CheckType::CheckIn, false)));

    let text = h.read(RecordKind::Visitors);
    assert!(text.contains(
        "Special Pass 7,N/A,SPECIAL,Special Pass Access,N/A,RFID,7770000001,2025-03-14 09:00:00,2025-03-15 09:00:00,ACTIVE,2025-03-14 09:00:00,"
    ));
}

#[tokio::test]
async fn test_roster_disabled_pass_is_deactivated() {
    let h = Harness::new().await;
    assert!(h.checkpoint.is_special_pass_expired("7770000002").await);

    let outcome = h.checkpoint.scan("7770000002").await;
    match outcome {
        ScanOutcome::Deactivated { person } => assert_eq!(person.status, RecordStatus::Inactive),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_roster_roles() {
    let h = Harness::new().await;

    let student = h.checkpoint.scan("0012345678").await;
    assert!(matches!(student, ScanOutcome::Admitted { ref person } if person.role == Role::Student));

    let teacher = h.checkpoint.scan("T100").await;
    assert!(matches!(teacher, ScanOutcome::Deactivated { .. }));

    let guard = h.checkpoint.scan("G001").await;
    assert!(matches!(guard, ScanOutcome::Recognized { .. }));
    assert_eq!(h.checkpoint.guard_name("G001").await, "Juan Cruz");

    let unknown = h.checkpoint.scan("424242").await;
    assert_eq!(unknown, ScanOutcome::Unknown);

    let log = h.read(RecordKind::AccessLog);
    assert!(log.contains(",0012345678,STUDENT_ACCESS,SUCCESS"));
    assert!(log.contains(",T100,TEACHER_DEACTIVATED,DENIED"));
    assert!(log.contains(",424242,UNKNOWN_ID,DENIED"));
    assert_eq!(log.matches("GUARD_CARD_SCAN").count(), 4);
}

#[tokio::test]
async fn test_student_admitted_when_mapping_rows_come_first() {
    let h = Harness::new().await;
    std::fs::write(
        h.path(RecordKind::Roster),
        "2021-00777,STUDENT_NUMBER,Lea Cruz,ACTIVE\n\
         0077777777,STUDENT_RFID,2021-00777,ACTIVE\n\
         0077777777,STUDENT,Lea Cruz,ACTIVE\n",
    )
    .unwrap();

    let person = h.checkpoint.find_person("0077777777").await.unwrap();
    assert_eq!(person.role, Role::Student);

    let outcome = h.checkpoint.scan("0077777777").await;
    assert!(matches!(outcome, ScanOutcome::Admitted { ref person } if person.name == "Lea Cruz"));
}

#[tokio::test]
async fn test_student_attendance_day() {
    let h = Harness::new().await;
    let visitors_before = h.read(RecordKind::Visitors);

    h.set("2025-03-14 07:30:00");
    assert_eq!(
        h.checkpoint.get_student_teacher_check_status("0012345678").await,
        CheckStatus::CheckedOut
    );
    assert_eq!(
        h.checkpoint.toggle_student_teacher_check("0012345678").await,
        Some(CheckType::CheckIn)
    );

    h.set("2025-03-14 16:00:00");
    assert_eq!(
        h.checkpoint.toggle_student_teacher_check("0012345678").await,
        Some(CheckType::CheckOut)
    );

    let times = h.checkpoint.get_student_teacher_check_times("0012345678").await;
    assert_eq!(times.check_in, Some(at("2025-03-14 07:30:00")));
    assert_eq!(times.check_out, Some(at("2025-03-14 16:00:00")));

    // Attendance never touches the visitor file
    assert_eq!(h.read(RecordKind::Visitors), visitors_before);
    assert!(h.read(RecordKind::Attendance).contains("0012345678,STUDENT,Jane Doe,"));

    // And survives a restart
    let reopened = Checkpoint::open_with_clock(StoreConfig::new(h.dir.path()), h.clock.clone())
        .await
        .unwrap();
    assert_eq!(
        reopened.get_student_teacher_check_status("0012345678").await,
        CheckStatus::CheckedOut
    );
}

#[tokio::test]
async fn test_attendance_refuses_non_members() {
    let h = Harness::new().await;

    // Inactive teacher, guard, Special Pass, unknown card
    for card in ["T100", "G001", "7770000001", "424242"] {
        assert!(!h.checkpoint.record_student_teacher_check(card, CheckType::CheckIn).await);
        assert_eq!(h.checkpoint.toggle_student_teacher_check(card).await, None);
    }

    assert!(h.checkpoint.record_student_teacher_check("0012345678", CheckType::CheckIn).await);
    assert_eq!(
        h.checkpoint.get_student_teacher_check_status("0012345678").await,
        CheckStatus::CheckedIn
    );
    assert_eq!(h.checkpoint.faults().counts().total(), 0);
}

#[tokio::test]
async fn test_scan_events_are_published() {
    let h = Harness::new().await;
    let mut events = h.checkpoint.subscribe();

    h.checkpoint.scan("G001").await;
    h.checkpoint.scan("nobody").await;

    let first = events.recv().await.unwrap();
    assert_eq!(first.credential, "G001");
    assert_eq!(first.display_message, DisplayMessages::GUARD_RECOGNIZED);
    assert_eq!(first.scanned_at, h.clock.now());

    let second = events.recv().await.unwrap();
    assert_eq!(second.outcome, ScanOutcome::Unknown);
    assert_ne!(first.event_id, second.event_id);
}

#[tokio::test]
async fn test_violations_persist_across_reopen() {
    let h = Harness::new().await;
    assert_eq!(h.checkpoint.get_violation_count("0012345678").await, 0);
    assert_eq!(h.checkpoint.add_violation("0012345678").await, 1);
    assert_eq!(h.checkpoint.add_violation("0012345678").await, 2);

    let reopened = Checkpoint::open_with_clock(StoreConfig::new(h.dir.path()), h.clock.clone())
        .await
        .unwrap();
    assert_eq!(reopened.get_violation_count("0012345678").await, 2);
    assert_eq!(h.read(RecordKind::Violations).lines().last(), Some("0012345678,2"));
}

#[tokio::test]
async fn test_concurrent_violations_lose_nothing() {
    let h = Harness::new().await;
    let checkpoint = Arc::new(h.checkpoint);

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let checkpoint = checkpoint.clone();
            tokio::spawn(async move { checkpoint.add_violation("0012345678").await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(checkpoint.get_violation_count("0012345678").await, 25);
}

#[tokio::test]
async fn test_student_number_lookup() {
    let h = Harness::new().await;
    std::fs::write(
        h.path(RecordKind::Roster),
        format!("{ROSTER}2021-00123,STUDENT_NUMBER,Jane Doe,ACTIVE\n0012345678,STUDENT_RFID,2021-00123,ACTIVE\n"),
    )
    .unwrap();

    assert!(h.checkpoint.is_student_number_valid("2021-00123").await);
    let person = h.checkpoint.get_person_by_student_number("2021-00123").await.unwrap();
    assert_eq!(person.id.as_str(), "0012345678");
    assert!(!h.checkpoint.is_student_number_valid("2099-99999").await);

    // Typing a student number at the scanner is not a card
    assert_eq!(h.checkpoint.scan("2021-00123").await, ScanOutcome::Unknown);
}

#[tokio::test]
async fn test_malformed_rows_survive_scans() {
    let h = Harness::new().await;
    std::fs::write(
        h.path(RecordKind::Visitors),
        "this row is not a visitor\n",
    )
    .unwrap();
    h.checkpoint.register_visitor(&form(PASS, "Maria Santos")).await.unwrap();
    h.checkpoint.scan(PASS).await;

    let text = h.read(RecordKind::Visitors);
    assert!(text.starts_with("this row is not a visitor\n"));
    assert_eq!(h.checkpoint.faults().counts().malformed_rows, 1);
}

#[tokio::test]
async fn test_ensure_and_add_visitor() {
    let h = Harness::new().await;
    let person = h.checkpoint.find_person("7770000001").await.unwrap();

    assert!(h.checkpoint.ensure_special_pass_record("7770000001", &person).await);
    assert!(!h.checkpoint.ensure_special_pass_record("7770000001", &person).await);

    let record = SpecialPassRecord::from_registration(
        &form("7770000001", "Maria Santos"),
        person.id.clone(),
        h.clock.now(),
    );
    assert!(h.checkpoint.add_visitor(record).await);

    let rows: Vec<_> = h
        .read(RecordKind::Visitors)
        .lines()
        .filter(|line| line.contains("7770000001"))
        .map(str::to_string)
        .collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",INACTIVE,"));
    assert!(rows[1].starts_with("Maria Santos,"));
}
