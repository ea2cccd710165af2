use storage::error::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LmsError>;

#[derive(Error, Debug)]
pub enum LmsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LMS returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}. Re-check the external-system integration")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl LmsError {
    /// Faults an instructor has to fix; retrying them never helps.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LmsError::Configuration(_) | LmsError::Storage(StorageError::Configuration(_))
        )
    }
}
