use tokio::sync::mpsc;
use uuid::Uuid;

pub use shellcast_store::SessionStatus;

/// Capacity of each subscriber's output queue. Beyond this the pump drops
/// chunks for that subscriber only rather than blocking.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 300;

/// In-memory metadata for a live or recently-live session. Mirrors
/// `shellcast_store::SessionRow` but omits nothing — it's also the source
/// used to build the row written to storage.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub id: Uuid,
    pub cwd: String,
    pub shell: String,
    pub cols: u16,
    pub rows: u16,
    pub created_at: i64,
    pub last_activity_at: i64,
    pub status: SessionStatus,
    pub scrollback: String,
}

impl SessionMeta {
    pub fn to_row(&self, pid: Option<u32>) -> shellcast_store::SessionRow {
        shellcast_store::SessionRow {
            id: self.id.to_string(),
            cwd: self.cwd.clone(),
            shell: self.shell.clone(),
            pid,
            status: self.status,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            cols: self.cols,
            rows: self.rows,
            scrollback: self.scrollback.clone(),
        }
    }
}

/// Public view returned by `list()` — deliberately excludes `scrollback`
/// (unbounded string, not useful in a listing) and internal plumbing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub cwd: String,
    pub shell: String,
    pub pid: Option<u32>,
    pub cols: u16,
    pub rows: u16,
    pub created_at: i64,
    pub last_activity_at: i64,
    pub status: SessionStatus,
}

/// Result of a successful `attach`: a receiver for live output chunks plus
/// the replay snapshot the caller must emit first.
pub struct Attachment {
    pub subscriber_id: u64,
    pub receiver: mpsc::Receiver<String>,
    pub replay: String,
}
