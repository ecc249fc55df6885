use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Credential errors
    #[error("Invalid credential id: {0}")]
    InvalidCredential(String),

    // Record field errors
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid record status: {0}")]
    InvalidStatus(String),

    #[error("Invalid check type: {0}")]
    InvalidCheckType(String),

    #[error("Invalid timestamp '{value}', expected {expected}")]
    InvalidTimestamp { value: String, expected: String },
}

pub type Result<T> = std::result::Result<T, Error>;
