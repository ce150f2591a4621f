//! Completed-recording persistence.
//!
//! One row per finished session, written after teardown. Raw SQL with
//! rusqlite, no ORM.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

/// A finished recording as stored in the database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRecord {
    pub id: i64,
    pub session_id: String,
    pub recording_id: Option<String>,
    pub call_id: String,
    pub call_type: String,
    pub group_id: String,
    pub file_url: Option<String>,
    pub duration_seconds: i64,
    pub started_at: String,
    pub stopped_at: String,
}

/// Fields for a new row; ids and stop timestamp come from the database.
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub session_id: String,
    pub recording_id: Option<String>,
    pub call_id: String,
    pub call_type: String,
    pub group_id: String,
    pub file_url: Option<String>,
    pub duration_seconds: i64,
    pub started_at: String,
}

pub struct RecordingRepository;

impl RecordingRepository {
    /// Insert a completed recording. Returns the new row ID.
    pub fn insert(conn: &Connection, recording: &NewRecording) -> Result<i64> {
        conn.execute(
            "INSERT INTO recordings (session_id, recording_id, call_id, call_type, group_id, \
             file_url, duration_seconds, started_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                recording.session_id,
                recording.recording_id,
                recording.call_id,
                recording.call_type,
                recording.group_id,
                recording.file_url,
                recording.duration_seconds,
                recording.started_at,
            ],
        )
        .context("Failed to insert recording")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a recording by row ID.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<RecordingRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, recording_id, call_id, call_type, group_id, file_url, \
                 duration_seconds, started_at, stopped_at \
                 FROM recordings WHERE id = ?1",
            )
            .context("Failed to prepare recording query")?;

        let mut rows = stmt
            .query_map(params![id], map_row)
            .context("Failed to query recording")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List recent recordings, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<RecordingRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, recording_id, call_id, call_type, group_id, file_url, \
                 duration_seconds, started_at, stopped_at \
                 FROM recordings ORDER BY stopped_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare recordings query")?;

        let records = stmt
            .query_map([limit], map_row)
            .context("Failed to query recordings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map recordings")?;

        Ok(records)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM recordings", [], |row| row.get(0))
            .context("Failed to count recordings")?;

        Ok(count)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordingRecord> {
    Ok(RecordingRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        recording_id: row.get(2)?,
        call_id: row.get(3)?,
        call_type: row.get(4)?,
        group_id: row.get(5)?,
        file_url: row.get(6)?,
        duration_seconds: row.get(7)?,
        started_at: row.get(8)?,
        stopped_at: row.get(9)?,
    })
}
