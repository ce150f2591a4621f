use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(&db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS recordings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            recording_id TEXT,
            call_id TEXT NOT NULL,
            call_type TEXT NOT NULL,
            group_id TEXT NOT NULL,
            file_url TEXT,
            duration_seconds INTEGER NOT NULL,
            started_at TIMESTAMP NOT NULL,
            stopped_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create recordings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_recordings_started_at ON recordings(started_at DESC)",
        [],
    )
    .context("Failed to create index on started_at")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_recordings_call_id ON recordings(call_id)",
        [],
    )
    .context("Failed to create index on call_id")?;

    Ok(())
}
