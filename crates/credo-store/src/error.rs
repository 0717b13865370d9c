use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("Status list is full")]
    StatusListFull,

    #[error("Index {index} out of bounds for status list of size {size}")]
    IndexOutOfBounds { index: u32, size: u32 },

    #[error("Signing failed: {0}")]
    Signer(String),

    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
