use thiserror::Error;

pub type Result<T> = std::result::Result<T, DynamyteError>;

#[derive(Error, Debug)]
pub enum DynamyteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Value for key already exists: {0}")]
    AlreadyExists(String),

    #[error("Value for key not found: {0}")]
    NotFound(String),

    #[error("No node owns key: {0}")]
    OwnerNotFound(String),

    #[error("Quorum not reached: need {required}, succeeded {succeeded} ({status_code} {reason})")]
    QuorumFailure {
        status_code: u16,
        reason: String,
        required: usize,
        succeeded: usize,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
