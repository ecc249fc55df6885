//! Display messages for guard scan results
//!
//! Every [`ScanOutcome`](crate::scan::ScanOutcome) maps to one of these
//! constants. Display surfaces show them verbatim on the guard screen.
//!
//! # Usage
//!
//! ```
//! use checkpoint_storage::messages::DisplayMessages;
//!
//! let message = DisplayMessages::DEACTIVATED_PASS;
//! println!("{}", message); // "Deactivated Pass"
//! ```

/// Display messages for guard scans
///
/// # Message Format
///
/// - Short enough for a single status line
/// - ASCII only
pub struct DisplayMessages;

impl DisplayMessages {
    /// Special Pass checked in
    pub const SPECIAL_PASS_CHECKED_IN: &'static str = "Special Pass Checked In";

    /// Special Pass checked out, including grace check-outs
    pub const SPECIAL_PASS_CHECKED_OUT: &'static str = "Special Pass Checked Out";

    /// Special Pass expired, superseded or disabled in the roster
    ///
    /// Also used for students and teachers whose roster row is INACTIVE.
    pub const DEACTIVATED_PASS: &'static str = "Deactivated Pass";

    /// Student or teacher recognized; uniform verification follows
    pub const ACCESS_GRANTED: &'static str = "Access Granted";

    /// Guard card recognized
    pub const GUARD_RECOGNIZED: &'static str = "Guard Recognized";

    /// Id resolves to nobody
    pub const UNKNOWN_ID: &'static str = "Unknown / Invalid ID";

    /// The backing files could not be read
    pub const SYSTEM_UNAVAILABLE: &'static str = "System Unavailable";
}
