use std::str::FromStr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use tracing::instrument;

use crate::error::{Result, StoreError};
use crate::schema::init_db;
use crate::types::{SessionRow, SessionStatus};

/// Durable key-value store for session metadata, scrollback, and settings.
///
/// Every operation is serialized behind a single `Mutex<Connection>` —
/// rusqlite connections are not `Sync`, and the spec only requires
/// concurrent-safety, not concurrent throughput. Every write commits
/// (rusqlite auto-commits outside an explicit transaction) before the call
/// returns, so callers never observe a torn write.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (and initialise) the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap an already-open (and already `init_db`-initialised) connection.
    /// Used by tests to run against an in-memory database.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------

    /// Insert or fully overwrite the row for `row.id`.
    #[instrument(skip(self, row), fields(id = %row.id, status = %row.status))]
    pub fn upsert_session(&self, row: &SessionRow) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions
                (id, cwd, shell, pid, status, created_at, last_activity_at, cols, rows, scrollback)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                cwd=excluded.cwd,
                shell=excluded.shell,
                pid=excluded.pid,
                status=excluded.status,
                last_activity_at=excluded.last_activity_at,
                cols=excluded.cols,
                rows=excluded.rows,
                scrollback=excluded.scrollback",
            rusqlite::params![
                row.id,
                row.cwd,
                row.shell,
                row.pid,
                row.status.as_str(),
                row.created_at,
                row.last_activity_at,
                row.cols,
                row.rows,
                row.scrollback,
            ],
        )?;
        Ok(())
    }

    /// All persisted rows, newest `created_at` first.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, cwd, shell, pid, status, created_at, last_activity_at, cols, rows, scrollback
             FROM sessions ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fetch one row by id.
    #[instrument(skip(self))]
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT id, cwd, shell, pid, status, created_at, last_activity_at, cols, rows, scrollback
             FROM sessions WHERE id = ?1",
            rusqlite::params![id],
            row_to_session,
        ) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Rewrite every row persisted as `running` to `stale`. Called once at
    /// startup, before any row is loaded into the live map — a restarted
    /// broker never resumes a PTY, so `running` from storage is always
    /// stale information.
    #[instrument(skip(self))]
    pub fn mark_running_rows_stale(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET status = ?1 WHERE status = ?2",
            rusqlite::params![SessionStatus::Stale.as_str(), SessionStatus::Running.as_str()],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------

    #[instrument(skip(self, value))]
    pub fn set_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let now = now_unix();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            rusqlite::params![key, value.to_string(), now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(raw) => Ok(serde_json::from_str(&raw).ok()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self))]
    pub fn get_all_settings(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key, value FROM app_settings")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((key, raw))
        })?;

        let mut map = serde_json::Map::new();
        for r in rows {
            let (key, raw) = r?;
            if let Ok(value) = serde_json::from_str(&raw) {
                map.insert(key, value);
            }
        }
        Ok(map)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    let status_str: String = row.get(4)?;
    let status = SessionStatus::from_str(&status_str).unwrap_or(SessionStatus::Stale);
    Ok(SessionRow {
        id: row.get(0)?,
        cwd: row.get(1)?,
        shell: row.get(2)?,
        pid: row.get::<_, Option<i64>>(3)?.map(|p| p as u32),
        status,
        created_at: row.get(5)?,
        last_activity_at: row.get(6)?,
        cols: row.get::<_, i64>(7)? as u16,
        rows: row.get::<_, i64>(8)? as u16,
        scrollback: row.get(9)?,
    })
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::from_connection(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn row(id: &str, status: SessionStatus, created_at: i64) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            cwd: "/tmp".to_string(),
            shell: "/bin/bash".to_string(),
            pid: Some(1234),
            status,
            created_at,
            last_activity_at: created_at,
            cols: 80,
            rows: 24,
            scrollback: String::new(),
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = test_store();
        let r = row("abc", SessionStatus::Running, 100);
        store.upsert_session(&r).unwrap();

        let got = store.get_session("abc").unwrap().unwrap();
        assert_eq!(got.id, "abc");
        assert_eq!(got.status, SessionStatus::Running);
        assert_eq!(got.pid, Some(1234));
    }

    #[test]
    fn get_missing_session_is_none() {
        let store = test_store();
        assert!(store.get_session("nope").unwrap().is_none());
    }

    #[test]
    fn list_sessions_orders_newest_first() {
        let store = test_store();
        store.upsert_session(&row("old", SessionStatus::Exited, 10)).unwrap();
        store.upsert_session(&row("new", SessionStatus::Running, 200)).unwrap();

        let rows = store.list_sessions().unwrap();
        assert_eq!(rows[0].id, "new");
        assert_eq!(rows[1].id, "old");
    }

    #[test]
    fn upsert_is_idempotent_overwrite() {
        let store = test_store();
        let mut r = row("abc", SessionStatus::Running, 100);
        store.upsert_session(&r).unwrap();

        r.status = SessionStatus::Killed;
        r.scrollback = "bye".to_string();
        store.upsert_session(&r).unwrap();

        let got = store.get_session("abc").unwrap().unwrap();
        assert_eq!(got.status, SessionStatus::Killed);
        assert_eq!(got.scrollback, "bye");
        // created_at is immutable across upserts.
        assert_eq!(got.created_at, 100);
    }

    #[test]
    fn mark_running_rows_stale_only_touches_running() {
        let store = test_store();
        store.upsert_session(&row("r", SessionStatus::Running, 1)).unwrap();
        store.upsert_session(&row("k", SessionStatus::Killed, 1)).unwrap();

        store.mark_running_rows_stale().unwrap();

        assert_eq!(store.get_session("r").unwrap().unwrap().status, SessionStatus::Stale);
        assert_eq!(store.get_session("k").unwrap().unwrap().status, SessionStatus::Killed);
    }

    #[test]
    fn settings_round_trip_and_default_absence() {
        let store = test_store();
        assert!(store.get_setting("max_sessions").unwrap().is_none());

        store
            .set_setting("max_sessions", &serde_json::json!(10))
            .unwrap();
        assert_eq!(
            store.get_setting("max_sessions").unwrap(),
            Some(serde_json::json!(10))
        );
    }

    #[test]
    fn get_all_settings_collects_every_key() {
        let store = test_store();
        store.set_setting("a", &serde_json::json!(1)).unwrap();
        store.set_setting("b", &serde_json::json!("two")).unwrap();

        let all = store.get_all_settings().unwrap();
        assert_eq!(all.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(all.get("b"), Some(&serde_json::json!("two")));
    }
}
