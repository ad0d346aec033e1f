use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions and settings tables. Safe to call on every
/// startup — uses `IF NOT EXISTS` throughout, and `WAL` mode so writers
/// don't block readers while the store is shared across the pump's
/// periodic flush and request handlers.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;

        CREATE TABLE IF NOT EXISTS sessions (
            id                TEXT PRIMARY KEY,
            cwd               TEXT NOT NULL,
            shell             TEXT NOT NULL,
            pid               INTEGER,
            status            TEXT NOT NULL,
            created_at        INTEGER NOT NULL,
            last_activity_at  INTEGER NOT NULL,
            cols              INTEGER NOT NULL,
            rows              INTEGER NOT NULL,
            scrollback        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_created
            ON sessions(created_at DESC);

        CREATE TABLE IF NOT EXISTS app_settings (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL
        );",
    )?;
    Ok(())
}
