//! Scan decision table for Special Passes
//!
//! A scan is decided from a snapshot of facts about the pass's current
//! record. The rules are tried in order and the first match wins:
//!
//! | # | when                                   | action              |
//! |---|----------------------------------------|---------------------|
//! | 1 | checked out and past expiry            | `RejectDeactivated` |
//! | 2 | checked in and within the grace window | `GraceCheckOut`     |
//! | 3 | expired (or disabled in the roster)    | `RejectDeactivated` |
//! | 4 | anything else                          | `Toggle`            |

use crate::models::{Checked, Expiring, SpecialPassRecord};
use checkpoint_core::{CheckStatus, CheckType};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Everything a scan decision depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassFacts {
    pub state: CheckStatus,
    pub expired_for_check_in: bool,
    pub in_grace: bool,
    pub expired: bool,
}

impl PassFacts {
    /// Facts about `current` at `now`. `roster_disabled` is true when the
    /// roster holds the pass id as an INACTIVE SPECIAL row.
    pub fn gather(
        current: Option<&SpecialPassRecord>,
        roster_disabled: bool,
        now: NaiveDateTime,
    ) -> Self {
        let Some(record) = current else {
            return Self {
                expired: roster_disabled,
                ..Self::default()
            };
        };

        let state = record.check_status();
        let past_expiry = record.is_expired_at(now);

        Self {
            state,
            expired_for_check_in: past_expiry,
            in_grace: state == CheckStatus::CheckedIn && record.is_in_grace_period(now),
            expired: roster_disabled || past_expiry,
        }
    }
}

/// What a scan does to the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassAction {
    /// Deny with "Deactivated Pass"; record untouched
    RejectDeactivated,
    /// Allow a late check-in to leave after expiry
    GraceCheckOut,
    /// Check in when out, check out when in
    Toggle,
}

/// One row of the decision table
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&PassFacts) -> bool,
    pub action: PassAction,
}

fn checked_out_past_expiry(facts: &PassFacts) -> bool {
    facts.state == CheckStatus::CheckedOut && facts.expired_for_check_in
}

fn checked_in_within_grace(facts: &PassFacts) -> bool {
    facts.state == CheckStatus::CheckedIn && facts.in_grace
}

fn expired(facts: &PassFacts) -> bool {
    facts.expired
}

fn always(_: &PassFacts) -> bool {
    true
}

/// Rules in priority order
pub const RULES: &[Rule] = &[
    Rule {
        name: "checked out past expiry",
        applies: checked_out_past_expiry,
        action: PassAction::RejectDeactivated,
    },
    Rule {
        name: "late check-in leaving",
        applies: checked_in_within_grace,
        action: PassAction::GraceCheckOut,
    },
    Rule {
        name: "expired",
        applies: expired,
        action: PassAction::RejectDeactivated,
    },
    Rule {
        name: "valid",
        applies: always,
        action: PassAction::Toggle,
    },
];

/// First rule that applies to `facts`.
pub fn matching_rule(facts: &PassFacts) -> &'static Rule {
    // The last rule always applies
    RULES
        .iter()
        .find(|rule| (rule.applies)(facts))
        .unwrap_or(&RULES[RULES.len() - 1])
}

pub fn decide(facts: &PassFacts) -> PassAction {
    matching_rule(facts).action
}

/// Check performed by an allowing action from `state`.
pub fn transition(action: PassAction, state: CheckStatus) -> Option<CheckType> {
    match action {
        PassAction::RejectDeactivated => None,
        PassAction::GraceCheckOut => Some(CheckType::CheckOut),
        PassAction::Toggle => Some(state.next_check()),
    }
}
