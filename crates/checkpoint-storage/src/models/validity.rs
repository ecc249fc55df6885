//! Trait for records with an activation status and a fixed expiry
//!
//! The expiry checks are defined once here. Implementors only say whether
//! they are active and when they expire. Every check takes `now`
//! explicitly so callers decide which clock applies.
//!
//! # Unparseable expiry
//!
//! An expiry column that is empty or does not parse counts as already
//! expired. A scan never grants access on a date it cannot read.
//!
//! # Usage
//!
//! ```
//! use checkpoint_storage::models::Expiring;
//! use checkpoint_core::TimestampField;
//! use checkpoint_core::timestamp::parse_timestamp;
//!
//! struct Badge {
//!     active: bool,
//!     expires: TimestampField,
//! }
//!
//! impl Expiring for Badge {
//!     fn is_active(&self) -> bool {
//!         self.active
//!     }
//!
//!     fn expires_at(&self) -> &TimestampField {
//!         &self.expires
//!     }
//! }
//!
//! let badge = Badge {
//!     active: true,
//!     expires: TimestampField::parse("2025-03-15 09:00:00"),
//! };
//! let before = parse_timestamp("2025-03-15 08:59:59").unwrap();
//! let after = parse_timestamp("2025-03-15 09:00:01").unwrap();
//! assert!(badge.is_live_at(before));
//! assert!(badge.is_expired_at(after));
//! ```

use checkpoint_core::TimestampField;
use checkpoint_core::constants::CLEANUP_DELAY;
use chrono::NaiveDateTime;

pub trait Expiring {
    /// Inactive records are never live and never count as expired: they are
    /// out of the lifecycle altogether.
    fn is_active(&self) -> bool;

    fn expires_at(&self) -> &TimestampField;

    /// Active and strictly before expiry.
    fn is_live_at(&self, now: NaiveDateTime) -> bool {
        self.is_active() && self.expires_at().valid().is_some_and(|expires| expires > now)
    }

    /// Active and strictly past expiry (or expiry unreadable).
    fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.expires_at().valid() {
            Some(expires) => now > expires,
            None => true,
        }
    }

    /// Active and more than [`CLEANUP_DELAY`] past expiry.
    ///
    /// Rows with an unreadable expiry are never due: cleanup only deletes
    /// what it can prove is stale.
    fn is_due_for_cleanup(&self, now: NaiveDateTime) -> bool {
        self.is_active()
            && self
                .expires_at()
                .valid()
                .is_some_and(|expires| now > expires + CLEANUP_DELAY)
    }
}
