//! Storage and decision layer for the checkpoint.
//!
//! This crate keeps the checkpoint's state in five line-oriented text files
//! and implements the Special Pass lifecycle on top of them: registration,
//! check-in/check-out with a grace window for late check-ins, deactivation of
//! superseded registrations and purging of stale ones.
//!
//! # Architecture
//!
//! - [`FlatFileStore`]: single-writer owner of the files; every mutation is
//!   one read-transform-rewrite critical section
//! - [`PersonResolver`]: id lookup across live registrations and the roster
//! - [`SpecialPassLifecycle`]: the Special Pass state machine, with the scan
//!   decision as an ordered rule table ([`lifecycle::rules`])
//! - [`ViolationLedger`]: monotonic per-person violation counters
//! - [`AccessLogger`]: append-only access log that never fails the caller
//! - [`AttendanceTracker`]: student and teacher check-ins, one row per card
//! - [`Checkpoint`]: facade wiring the above and applying the fail-open
//!   policy; publishes [`ScanEvent`]s and [`StorageFault`]s
//!
//! # Files
//!
//! | file              | layout                                   |
//! |-------------------|------------------------------------------|
//! | `database.txt`    | `id,role,name[,status]`                  |
//! | `visitors.txt`    | 12 columns, see [`SpecialPassRecord`]    |
//! | `violations.txt`  | `personId,count`                         |
//! | `access_log.txt`  | `timestamp,id,action,status`             |
//! | `attendance.txt`  | 6 columns, see [`AttendanceRecord`]      |
//!
//! Lines starting with `#` are comments. A row that cannot be parsed is
//! kept in place on every rewrite and reported once as a [`StorageFault`].
//!
//! # Examples
//!
//! ```no_run
//! use checkpoint_storage::{Checkpoint, StoreConfig, VisitorRegistration};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checkpoint = Checkpoint::open(StoreConfig::from_file("checkpoint.toml")?).await?;
//!
//! let form = VisitorRegistration {
//!     name: "Maria Santos".to_string(),
//!     contact: "09171234567".to_string(),
//!     visiting_as: "Parent".to_string(),
//!     purpose: "Enrollment".to_string(),
//!     visiting: "Registrar".to_string(),
//!     id_type: "Driver's License".to_string(),
//!     special_pass_id: "5551234567".to_string(),
//! };
//! let record = checkpoint.register_visitor(&form).await?;
//! println!("Pass valid until {}", record.expires_at);
//!
//! // First scan checks in, second checks out
//! let outcome = checkpoint.scan("5551234567").await;
//! assert!(outcome.is_granted());
//! # Ok(())
//! # }
//! ```

pub mod attendance;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod logger;
pub mod messages;
pub mod models;
pub mod resolver;
pub mod scan;
pub mod store;

pub use attendance::AttendanceTracker;
pub use checkpoint::Checkpoint;
pub use config::StoreConfig;
pub use error::{StorageError, StorageResult};
pub use events::{FaultChannel, FaultCounts, FaultKind, ScanEvent, StorageFault};
pub use ledger::ViolationLedger;
pub use lifecycle::{PassVerdict, SpecialPassLifecycle};
pub use logger::AccessLogger;
pub use messages::DisplayMessages;
pub use models::{
    AccessLogEntry, AttendanceRecord, CheckTimes, Checked, PassHolder, SpecialPassRecord,
    ViolationRecord, VisitorRegistration,
};
pub use resolver::PersonResolver;
pub use scan::ScanOutcome;
pub use store::{FlatFileStore, RecordKind};
