//! Result of a guard scan

use crate::messages::DisplayMessages;
use checkpoint_core::constants::{DEFAULT_LOG_STATUS, DENIED_LOG_STATUS};
use checkpoint_core::{CheckType, PersonRecord, Role};
use serde::Serialize;

/// What a guard scan decided
///
/// `Admitted` only means the person is known and active. Students and
/// teachers still go through uniform verification, which is outside this
/// crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Special Pass checked in or out
    SpecialPass {
        person: PersonRecord,
        check: CheckType,
        /// Check-out allowed after expiry because the check-in was late
        grace: bool,
    },
    /// Active student or teacher
    Admitted { person: PersonRecord },
    /// Guard or other non-visitor role
    Recognized { person: PersonRecord },
    /// Expired or disabled pass, or an INACTIVE student or teacher
    Deactivated { person: PersonRecord },
    Unknown,
    /// The backing files could not be read
    Unavailable,
}

impl ScanOutcome {
    pub fn display_message(&self) -> &'static str {
        match self {
            ScanOutcome::SpecialPass {
                check: CheckType::CheckIn,
                ..
            } => DisplayMessages::SPECIAL_PASS_CHECKED_IN,
            ScanOutcome::SpecialPass {
                check: CheckType::CheckOut,
                ..
            } => DisplayMessages::SPECIAL_PASS_CHECKED_OUT,
            ScanOutcome::Admitted { .. } => DisplayMessages::ACCESS_GRANTED,
            ScanOutcome::Recognized { .. } => DisplayMessages::GUARD_RECOGNIZED,
            ScanOutcome::Deactivated { .. } => DisplayMessages::DEACTIVATED_PASS,
            ScanOutcome::Unknown => DisplayMessages::UNKNOWN_ID,
            ScanOutcome::Unavailable => DisplayMessages::SYSTEM_UNAVAILABLE,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            ScanOutcome::SpecialPass { .. }
                | ScanOutcome::Admitted { .. }
                | ScanOutcome::Recognized { .. }
        )
    }

    pub fn person(&self) -> Option<&PersonRecord> {
        match self {
            ScanOutcome::SpecialPass { person, .. }
            | ScanOutcome::Admitted { person }
            | ScanOutcome::Recognized { person }
            | ScanOutcome::Deactivated { person } => Some(person),
            ScanOutcome::Unknown | ScanOutcome::Unavailable => None,
        }
    }

    /// Access log `(action, status)` for the outcome, if it is logged.
    ///
    /// Guard scans and storage failures only leave the `GUARD_CARD_SCAN`
    /// line written before the decision.
    pub fn log_entry(&self) -> Option<(String, &'static str)> {
        match self {
            ScanOutcome::SpecialPass {
                check: CheckType::CheckIn,
                ..
            } => Some(("SPECIAL_PASS_CHECK_IN".to_string(), DEFAULT_LOG_STATUS)),
            ScanOutcome::SpecialPass {
                check: CheckType::CheckOut,
                ..
            } => Some(("SPECIAL_PASS_CHECK_OUT".to_string(), DEFAULT_LOG_STATUS)),
            ScanOutcome::Admitted { person } => {
                Some((format!("{}_ACCESS", person.role), DEFAULT_LOG_STATUS))
            }
            ScanOutcome::Deactivated { person } if person.role == Role::Special => {
                Some(("SPECIAL_PASS_DEACTIVATED".to_string(), DENIED_LOG_STATUS))
            }
            ScanOutcome::Deactivated { person } => {
                Some((format!("{}_DEACTIVATED", person.role), DENIED_LOG_STATUS))
            }
            ScanOutcome::Unknown => Some(("UNKNOWN_ID".to_string(), DENIED_LOG_STATUS)),
            ScanOutcome::Recognized { .. } | ScanOutcome::Unavailable => None,
        }
    }
}
