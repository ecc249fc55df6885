//! Policy and format constants for the checkpoint.
//!
//! The time windows here govern the Special Pass lifecycle: how long a pass
//! is valid, how long a late check-in may still check out, and how long an
//! expired registration lingers before the cleanup pass purges it.
//!
//! ```
//! use checkpoint_core::constants::*;
//!
//! assert_eq!(SPECIAL_PASS_VALIDITY.num_hours(), 24);
//! assert_eq!(GRACE_WINDOW.num_minutes(), 10);
//! assert_eq!(CLEANUP_DELAY.num_hours(), 1);
//! ```

use chrono::TimeDelta;

// ============================================================================
// Special Pass Policy
// ============================================================================

/// Lifetime of a Special Pass registration, counted from `createdAt`.
pub const SPECIAL_PASS_VALIDITY: TimeDelta = TimeDelta::hours(24);

/// Grace window for late check-ins.
///
/// A pass checked in with this much time or less left before expiry may
/// still check out after it expires.
pub const GRACE_WINDOW: TimeDelta = TimeDelta::minutes(10);

/// Delay after expiry before a registration is purged from the store.
pub const CLEANUP_DELAY: TimeDelta = TimeDelta::hours(1);

// ============================================================================
// Line Format
// ============================================================================

/// Field separator used by every flat file.
pub const FIELD_SEPARATOR: char = ',';

/// Prefix marking a comment line.
pub const COMMENT_PREFIX: char = '#';

/// Timestamp layout used in every flat file (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Defaults
// ============================================================================

/// Access log status recorded when the caller does not supply one.
pub const DEFAULT_LOG_STATUS: &str = "SUCCESS";

/// Status recorded for denied scans.
pub const DENIED_LOG_STATUS: &str = "DENIED";

/// Name reported for an id that does not resolve to a guard.
pub const UNKNOWN_GUARD_NAME: &str = "Unknown Guard";

/// Placeholder used for visitor fields a roster-seeded pass has no value for.
pub const NOT_APPLICABLE: &str = "N/A";
