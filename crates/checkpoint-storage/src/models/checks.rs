//! Check-in/check-out columns shared by Special Passes and attendance rows
//!
//! Both record families carry a check-in and a check-out timestamp, and
//! derive the check state from them the same way. Implementors expose the
//! two columns; the state logic is defined once here.

use checkpoint_core::{CheckStatus, CheckType, TimestampField};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Check-in and check-out instants of a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckTimes {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
}

pub trait Checked {
    /// `(check_in, check_out)`
    fn check_columns(&self) -> (&TimestampField, &TimestampField);

    fn check_columns_mut(&mut self) -> (&mut TimestampField, &mut TimestampField);

    /// Derived check state
    ///
    /// - `CheckedIn`: check-in recorded, check-out empty
    /// - `CheckedOut`: anything else (never checked in, or checked out since)
    fn check_status(&self) -> CheckStatus {
        let (check_in, check_out) = self.check_columns();
        if !check_in.is_empty() && check_out.is_empty() {
            CheckStatus::CheckedIn
        } else {
            CheckStatus::CheckedOut
        }
    }

    /// Record a check. A check-in clears any earlier check-out.
    fn apply_check(&mut self, check: CheckType, now: NaiveDateTime) {
        let (check_in, check_out) = self.check_columns_mut();
        match check {
            CheckType::CheckIn => {
                *check_in = now.into();
                *check_out = TimestampField::Empty;
            }
            CheckType::CheckOut => {
                *check_out = now.into();
            }
        }
        debug_assert_eq!(self.check_status(), check.resulting_status());
    }

    fn check_times(&self) -> CheckTimes {
        let (check_in, check_out) = self.check_columns();
        CheckTimes {
            check_in: check_in.valid(),
            check_out: check_out.valid(),
        }
    }

    /// The check a toggle performs next: in when out, out when in.
    fn next_check(&self) -> CheckType {
        match self.check_status() {
            CheckStatus::CheckedIn => CheckType::CheckOut,
            CheckStatus::CheckedOut => CheckType::CheckIn,
        }
    }
}
