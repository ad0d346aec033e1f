use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a session, persisted as its lowercase name.
///
/// `Running` is only ever written by the session manager while the PTY is
/// live; on restart every row persisted as `Running` is rewritten to
/// `Stale` before the manager loads anything into memory, so a freshly
/// booted process never observes `Running` from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Exited,
    Killed,
    Stale,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Exited => "exited",
            SessionStatus::Killed => "killed",
            SessionStatus::Stale => "stale",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(SessionStatus::Running),
            "exited" => Ok(SessionStatus::Exited),
            "killed" => Ok(SessionStatus::Killed),
            "stale" => Ok(SessionStatus::Stale),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// The persisted shape of a session row — mirrors the in-memory `Session`
/// minus the live PTY handle, pump task, and subscriber set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub cwd: String,
    pub shell: String,
    pub pid: Option<u32>,
    pub status: SessionStatus,
    pub created_at: i64,
    pub last_activity_at: i64,
    pub cols: u16,
    pub rows: u16,
    pub scrollback: String,
}
