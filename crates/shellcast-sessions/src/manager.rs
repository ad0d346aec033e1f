use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use shellcast_pty::PtyHandle;
use shellcast_store::{EffectiveSettings, SessionStatus, Store};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::{Attachment, SessionMeta, SessionView, SUBSCRIBER_QUEUE_CAPACITY};

const FLUSH_INTERVAL: Duration = Duration::from_millis(500);
const PUMP_TICK: Duration = Duration::from_millis(20);
const READ_CHUNK_SIZE: usize = 4096;

struct SessionEntry {
    meta: SessionMeta,
    pid: Option<u32>,
    pty: Option<Arc<PtyHandle>>,
    cancel: Option<CancellationToken>,
    pump: Option<JoinHandle<()>>,
    subscribers: HashMap<u64, mpsc::Sender<String>>,
    next_subscriber_id: u64,
}

impl SessionEntry {
    fn from_row(row: shellcast_store::SessionRow) -> Result<(Uuid, Self)> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| SessionError::PtySpawnFailure(format!("malformed session id in storage: {e}")))?;
        let entry = Self {
            meta: SessionMeta {
                id,
                cwd: row.cwd,
                shell: row.shell,
                cols: row.cols,
                rows: row.rows,
                created_at: row.created_at,
                last_activity_at: row.last_activity_at,
                status: row.status,
                scrollback: row.scrollback,
            },
            pid: row.pid,
            pty: None,
            cancel: None,
            pump: None,
            subscribers: HashMap::new(),
            next_subscriber_id: 0,
        };
        Ok((id, entry))
    }
}

struct Inner {
    store: Store,
    state: Mutex<HashMap<Uuid, SessionEntry>>,
}

/// Owns every live PTY session: spawning, attaching subscribers, routing
/// input, and tearing sessions down. Cheap to clone — clones share the same
/// underlying state, which is how the pump task (spawned separately per
/// session) reaches back into the manager.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// The underlying store, exposed so callers can resolve effective
    /// settings without the manager needing its own settings-specific API.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Rewrites every row persisted as `running` to `stale` (a restarted
    /// broker never resumes a PTY), then loads every persisted row into the
    /// live map with no PTY, no pump, and its stored status.
    #[instrument(skip(self))]
    pub async fn restart_recovery(&self) -> Result<()> {
        self.inner.store.mark_running_rows_stale()?;
        let rows = self.inner.store.list_sessions()?;

        let mut state = self.inner.state.lock().unwrap();
        for row in rows {
            let (id, entry) = SessionEntry::from_row(row)?;
            state.entry(id).or_insert(entry);
        }
        Ok(())
    }

    /// Spawns a new PTY, registers it, persists the initial `running` row,
    /// and launches its output pump. Atomic: on any failure after the
    /// capacity check, nothing is left registered.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        cwd: Option<String>,
        shell: Option<String>,
        cols: u16,
        rows: u16,
    ) -> Result<Uuid> {
        let settings = EffectiveSettings::resolve(&self.inner.store)?;

        {
            let state = self.inner.state.lock().unwrap();
            let running = state
                .values()
                .filter(|e| e.meta.status == SessionStatus::Running)
                .count();
            if running >= settings.max_sessions as usize {
                return Err(SessionError::CapacityExceeded);
            }
        }

        let cwd = resolve_cwd(cwd);
        let shell = shell
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| settings.default_shell().to_string());

        let spawn_shell = shell.clone();
        let spawn_cwd = cwd.clone();
        let pty = tokio::task::spawn_blocking(move || PtyHandle::spawn(&spawn_shell, &spawn_cwd, cols, rows))
            .await
            .map_err(|e| SessionError::PtySpawnFailure(format!("spawn task panicked: {e}")))?
            .map_err(|e| SessionError::PtySpawnFailure(e.to_string()))?;
        let pid = pty.pid();
        let pty = Arc::new(pty);

        let id = Uuid::new_v4();
        let now = now_unix();
        let cancel = CancellationToken::new();

        {
            let mut state = self.inner.state.lock().unwrap();
            let running = state
                .values()
                .filter(|e| e.meta.status == SessionStatus::Running)
                .count();
            if running >= settings.max_sessions as usize {
                pty.terminate();
                return Err(SessionError::CapacityExceeded);
            }
            state.insert(
                id,
                SessionEntry {
                    meta: SessionMeta {
                        id,
                        cwd: cwd.clone(),
                        shell: shell.clone(),
                        cols,
                        rows,
                        created_at: now,
                        last_activity_at: now,
                        status: SessionStatus::Running,
                        scrollback: String::new(),
                    },
                    pid,
                    pty: Some(pty.clone()),
                    cancel: Some(cancel.clone()),
                    pump: None,
                    subscribers: HashMap::new(),
                    next_subscriber_id: 0,
                },
            );
        }

        self.inner.store.upsert_session(&shellcast_store::SessionRow {
            id: id.to_string(),
            cwd,
            shell,
            pid,
            status: SessionStatus::Running,
            created_at: now,
            last_activity_at: now,
            cols,
            rows,
            scrollback: String::new(),
        })?;

        let manager = self.clone();
        let pump_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            manager
                .run_pump(
                    id,
                    pty,
                    pump_cancel,
                    settings.scrollback_limit_chars,
                    settings.idle_ttl_seconds,
                )
                .await;
        });

        if let Some(entry) = self.inner.state.lock().unwrap().get_mut(&id) {
            entry.pump = Some(handle);
        }

        info!(%id, "created session");
        Ok(id)
    }

    /// Registers a new subscriber queue and returns the current scrollback
    /// to replay. Fails with `NotFound` if the session isn't live.
    pub fn attach(&self, id: Uuid) -> Result<Attachment> {
        let mut state = self.inner.state.lock().unwrap();
        let entry = state.get_mut(&id).ok_or(SessionError::NotFound(id))?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let subscriber_id = entry.next_subscriber_id;
        entry.next_subscriber_id += 1;
        entry.subscribers.insert(subscriber_id, tx);

        Ok(Attachment {
            subscriber_id,
            receiver: rx,
            replay: entry.meta.scrollback.clone(),
        })
    }

    /// Removes a subscriber. Idempotent — detaching twice, or detaching
    /// from a session that no longer exists, is not an error.
    pub fn detach(&self, id: Uuid, subscriber_id: u64) {
        if let Some(entry) = self.inner.state.lock().unwrap().get_mut(&id) {
            entry.subscribers.remove(&subscriber_id);
        }
    }

    /// Forwards bytes to the PTY. A no-op if the session isn't running.
    /// A write failure transitions the session to `exited`.
    pub async fn write(&self, id: Uuid, data: &[u8]) -> Result<()> {
        let pty = {
            let mut state = self.inner.state.lock().unwrap();
            match state.get_mut(&id) {
                Some(entry) if entry.meta.status == SessionStatus::Running => {
                    entry.meta.last_activity_at = now_unix();
                    entry.pty.clone()
                }
                _ => return Ok(()),
            }
        };

        if let Some(pty) = pty {
            if let Err(e) = pty.write(data) {
                warn!(%id, error = %e, "pty write failed, marking session exited");
                self.transition_exited(id).await;
            }
        }
        Ok(())
    }

    /// Resizes the PTY and updates stored dimensions. A no-op if not running.
    pub async fn resize(&self, id: Uuid, cols: u16, rows: u16) -> Result<()> {
        let pty = {
            let mut state = self.inner.state.lock().unwrap();
            match state.get_mut(&id) {
                Some(entry) if entry.meta.status == SessionStatus::Running => {
                    entry.meta.cols = cols;
                    entry.meta.rows = rows;
                    entry.meta.last_activity_at = now_unix();
                    entry.pty.clone()
                }
                _ => return Ok(()),
            }
        };

        if let Some(pty) = pty {
            if let Err(e) = pty.resize(cols, rows) {
                warn!(%id, error = %e, "pty resize failed");
            }
        }
        Ok(())
    }

    /// Cancels the pump, terminates the PTY, persists `killed`, and evicts
    /// the session from the live map. Idempotent: killing an unknown or
    /// already-terminal session is a no-op, not an error.
    #[instrument(skip(self))]
    pub async fn kill(&self, id: Uuid) -> Result<()> {
        self.kill_inner(id, false).await
    }

    /// Shared teardown for `kill` and the pump's own idle-TTL path.
    ///
    /// `from_pump = true` means the caller *is* the running pump task about
    /// to return — its own `JoinHandle` can never be awaited from inside
    /// itself (that future would never resolve), so that case skips the
    /// join and relies on the pump returning right after this call instead.
    async fn kill_inner(&self, id: Uuid, from_pump: bool) -> Result<()> {
        let (cancel, pump, pty) = {
            let mut state = self.inner.state.lock().unwrap();
            match state.get_mut(&id) {
                None => return Ok(()),
                Some(entry) if entry.meta.status != SessionStatus::Running => return Ok(()),
                Some(entry) => {
                    entry.meta.status = SessionStatus::Killed;
                    entry.meta.last_activity_at = now_unix();
                    (entry.cancel.take(), entry.pump.take(), entry.pty.take())
                }
            }
        };

        if let Some(pty) = &pty {
            pty.terminate();
        }
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if !from_pump {
            if let Some(handle) = pump {
                let _ = handle.await;
            }
        }

        self.persist(id);
        self.inner.state.lock().unwrap().remove(&id);
        info!(%id, "killed session");
        Ok(())
    }

    /// Public attributes of every `running` session, newest first.
    pub fn list(&self) -> Vec<SessionView> {
        let state = self.inner.state.lock().unwrap();
        let mut views: Vec<SessionView> = state
            .values()
            .filter(|e| e.meta.status == SessionStatus::Running)
            .map(|e| SessionView {
                id: e.meta.id,
                cwd: e.meta.cwd.clone(),
                shell: e.meta.shell.clone(),
                pid: e.pid,
                cols: e.meta.cols,
                rows: e.meta.rows,
                created_at: e.meta.created_at,
                last_activity_at: e.meta.last_activity_at,
                status: e.meta.status,
            })
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    // -----------------------------------------------------------------
    // Output pump
    // -----------------------------------------------------------------

    async fn run_pump(
        self,
        id: Uuid,
        pty: Arc<PtyHandle>,
        cancel: CancellationToken,
        scrollback_limit: usize,
        idle_ttl_seconds: u64,
    ) {
        let mut last_flush = Instant::now();

        loop {
            if !self.is_running(id) {
                return;
            }

            let read_pty = pty.clone();
            let read_result = tokio::select! {
                _ = cancel.cancelled() => return,
                res = tokio::task::spawn_blocking(move || read_pty.read(READ_CHUNK_SIZE)) => res,
            };

            match read_result {
                Err(join_err) => {
                    warn!(%id, error = %join_err, "pty read task failed");
                    self.transition_exited(id).await;
                    return;
                }
                Ok(Err(read_err)) => {
                    warn!(%id, error = %read_err, "pty closed");
                    self.transition_exited(id).await;
                    return;
                }
                Ok(Ok(bytes)) if !bytes.is_empty() => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    self.append_output(id, &text, scrollback_limit);
                }
                Ok(Ok(_)) => {}
            }

            if last_flush.elapsed() >= FLUSH_INTERVAL {
                last_flush = Instant::now();
                self.persist(id);
            }

            if idle_ttl_seconds > 0 {
                if let Some(idle) = self.idle_seconds(id) {
                    if idle > idle_ttl_seconds {
                        info!(%id, idle, "idle ttl exceeded, killing session");
                        let _ = self.kill_inner(id, true).await;
                        return;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(PUMP_TICK) => {}
            }
        }
    }

    fn is_running(&self, id: Uuid) -> bool {
        matches!(
            self.inner.state.lock().unwrap().get(&id),
            Some(entry) if entry.meta.status == SessionStatus::Running
        )
    }

    fn append_output(&self, id: Uuid, text: &str, scrollback_limit: usize) {
        let subscribers: Vec<mpsc::Sender<String>> = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(entry) = state.get_mut(&id) else {
                return;
            };
            entry.meta.scrollback.push_str(text);
            truncate_suffix(&mut entry.meta.scrollback, scrollback_limit);
            entry.meta.last_activity_at = now_unix();
            entry.subscribers.values().cloned().collect()
        };

        for tx in subscribers {
            let _ = tx.try_send(text.to_string());
        }
    }

    async fn transition_exited(&self, id: Uuid) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(entry) = state.get_mut(&id) {
                entry.meta.status = SessionStatus::Exited;
                entry.meta.last_activity_at = now_unix();
                entry.pty = None;
                entry.cancel = None;
            }
        }
        self.persist(id);
    }

    fn persist(&self, id: Uuid) {
        let row = {
            let state = self.inner.state.lock().unwrap();
            state.get(&id).map(|e| e.meta.to_row(e.pid))
        };
        if let Some(row) = row {
            if let Err(e) = self.inner.store.upsert_session(&row) {
                warn!(%id, error = %e, "periodic persistence flush failed, will retry");
            }
        }
    }

    fn idle_seconds(&self, id: Uuid) -> Option<u64> {
        let state = self.inner.state.lock().unwrap();
        let entry = state.get(&id)?;
        let idle = now_unix() - entry.meta.last_activity_at;
        Some(idle.max(0) as u64)
    }
}

fn resolve_cwd(cwd: Option<String>) -> String {
    match cwd {
        Some(path) if std::path::Path::new(&path).is_dir() => path,
        _ => std::env::var("HOME").unwrap_or_else(|_| "/".to_string()),
    }
}

fn truncate_suffix(s: &mut String, limit: usize) {
    let char_count = s.chars().count();
    if char_count <= limit {
        return;
    }
    let skip = char_count - limit;
    let byte_offset = s
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    s.drain(..byte_offset);
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
