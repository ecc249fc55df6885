use crate::{
    Result,
    constants::{COMMENT_PREFIX, FIELD_SEPARATOR},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Scanned credential identifier (RFID badge, Special Pass code, student number)
///
/// # Security
/// Comparison is constant-time so a scan cannot guess stored ids through
/// response timing.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialId(String);

impl CredentialId {
    /// Create a credential id with validation.
    ///
    /// The id is trimmed before validation. Case is preserved.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if the id is empty, contains the
    /// field separator or a line break, or starts with the comment prefix.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::InvalidCredential("empty id".to_string()));
        }

        if id.starts_with(COMMENT_PREFIX) {
            return Err(Error::InvalidCredential(format!(
                "id must not start with '{COMMENT_PREFIX}': {id}"
            )));
        }

        if id.contains(FIELD_SEPARATOR) || id.contains(['\n', '\r']) {
            return Err(Error::InvalidCredential(format!(
                "id must not contain '{FIELD_SEPARATOR}' or line breaks: {id}"
            )));
        }

        Ok(CredentialId(id.to_string()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a raw field value.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        self.0.as_bytes().ct_eq(raw.as_bytes()).into()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CredentialId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CredentialId::new(s)
    }
}

impl TryFrom<String> for CredentialId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CredentialId::new(&value)
    }
}

impl From<CredentialId> for String {
    fn from(id: CredentialId) -> String {
        id.0
    }
}

impl PartialEq for CredentialId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl std::hash::Hash for CredentialId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Role column of a roster row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Guard,
    Student,
    Teacher,
    /// Visitor Special Pass
    Special,
    /// Mapping row: `number,STUDENT_NUMBER,name,status`
    StudentNumber,
    /// Mapping row: `rfid,STUDENT_RFID,number,status`
    StudentRfid,
}

impl Role {
    /// The column value written to the roster file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guard => "GUARD",
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Special => "SPECIAL",
            Role::StudentNumber => "STUDENT_NUMBER",
            Role::StudentRfid => "STUDENT_RFID",
        }
    }

    /// Returns `true` for the secondary mapping rows.
    #[must_use]
    pub fn is_mapping(self) -> bool {
        matches!(self, Role::StudentNumber | Role::StudentRfid)
    }

    /// Returns `true` for roles that go through the uniform check.
    #[must_use]
    pub fn is_student_or_teacher(self) -> bool {
        matches!(self, Role::Student | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "GUARD" => Ok(Role::Guard),
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "SPECIAL" => Ok(Role::Special),
            "STUDENT_NUMBER" => Ok(Role::StudentNumber),
            "STUDENT_RFID" => Ok(Role::StudentRfid),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

/// ACTIVE/INACTIVE status shared by roster rows and Special Pass records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "ACTIVE",
            RecordStatus::Inactive => "INACTIVE",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ACTIVE" => Ok(RecordStatus::Active),
            "INACTIVE" => Ok(RecordStatus::Inactive),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Derived check state of a Special Pass or attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// No check-in, or a check-in followed by a check-out.
    #[default]
    CheckedOut,
    /// Check-in recorded and no check-out since.
    CheckedIn,
}

impl CheckStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::CheckedOut => "CHECKED_OUT",
            CheckStatus::CheckedIn => "CHECKED_IN",
        }
    }

    /// The check a valid scan performs from this state.
    #[must_use]
    pub fn next_check(self) -> CheckType {
        match self {
            CheckStatus::CheckedOut => CheckType::CheckIn,
            CheckStatus::CheckedIn => CheckType::CheckOut,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check recorded against a Special Pass or attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    CheckIn,
    CheckOut,
}

impl CheckType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::CheckIn => "CHECK_IN",
            CheckType::CheckOut => "CHECK_OUT",
        }
    }

    /// The state a pass is in after this check.
    #[must_use]
    pub fn resulting_status(self) -> CheckStatus {
        match self {
            CheckType::CheckIn => CheckStatus::CheckedIn,
            CheckType::CheckOut => CheckStatus::CheckedOut,
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "CHECK_IN" => Ok(CheckType::CheckIn),
            "CHECK_OUT" => Ok(CheckType::CheckOut),
            other => Err(Error::InvalidCheckType(other.to_string())),
        }
    }
}

/// A person a credential resolves to
///
/// Roster rows map onto this directly. A live Special Pass registration is
/// surfaced as a `PersonRecord` with role [`Role::Special`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: CredentialId,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

impl PersonRecord {
    pub fn new(id: CredentialId, role: Role, name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            name: name.into(),
            status: RecordStatus::Active,
        }
    }

    /// Set the status (builder style).
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
