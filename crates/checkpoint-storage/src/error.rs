use thiserror::Error;

/// Storage-specific error types for the checkpoint.
///
/// These errors represent failures reading or rewriting the flat files and
/// refusals from the registration flow. The [`Checkpoint`](crate::Checkpoint)
/// facade turns them into safe defaults; the components underneath return
/// them as-is.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading, writing or renaming a backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain value failed validation
    #[error("Invalid value: {0}")]
    Core(#[from] checkpoint_core::Error),

    /// A line could not be interpreted as a record of its file
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A required registration field was empty
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The Special Pass id already belongs to a live registration
    #[error("Special Pass in use by {holder} until {expires_at}")]
    PassInUse { holder: String, expires_at: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
