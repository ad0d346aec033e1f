use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No persisted row exists for the requested session id.
    #[error("session row not found: {id}")]
    NotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
