use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    /// `max_sessions` running sessions already exist.
    #[error("session capacity exceeded")]
    CapacityExceeded,

    /// No session with this id is currently live.
    #[error("session not found: {0}")]
    NotFound(Uuid),

    /// The PTY could not be spawned.
    #[error("failed to spawn pty: {0}")]
    PtySpawnFailure(String),

    /// A read or write against a live PTY failed outside the pump.
    #[error("pty i/o error: {0}")]
    PtyIoError(String),

    /// The persistence layer failed.
    #[error(transparent)]
    Store(#[from] shellcast_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
