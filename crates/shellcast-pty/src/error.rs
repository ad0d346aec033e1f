//! Error types for the shellcast-pty crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    /// PTY allocation or child-process spawn failed.
    #[error("PTY spawn error: {0}")]
    Spawn(String),

    /// The child closed its side of the PTY (shell exited).
    #[error("PTY reached end of stream")]
    Eof,

    /// Underlying I/O failure (read, write, resize).
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;
