use super::init::migrate;
use super::recordings::{NewRecording, RecordingRepository};
use anyhow::Result;
use rusqlite::Connection;

fn setup_test_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(conn)
}

fn sample_recording(call_id: &str) -> NewRecording {
    NewRecording {
        session_id: "a3f1c2d4".to_string(),
        recording_id: Some(format!("rec-{call_id}")),
        call_id: call_id.to_string(),
        call_type: "audio".to_string(),
        group_id: "group-1".to_string(),
        file_url: Some(format!("https://storage.example.com/{call_id}.mp4")),
        duration_seconds: 312,
        started_at: "2026-08-06T10:00:00+00:00".to_string(),
    }
}

#[test]
fn test_migrate_creates_table() {
    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();

    // Verify table exists by querying it
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='recordings'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_insert_recording() {
    let conn = setup_test_db().unwrap();

    let id = RecordingRepository::insert(&conn, &sample_recording("call-1")).unwrap();
    assert!(id > 0);
    assert_eq!(RecordingRepository::count(&conn).unwrap(), 1);
}

#[test]
fn test_get_recording() {
    let conn = setup_test_db().unwrap();
    let id = RecordingRepository::insert(&conn, &sample_recording("call-1")).unwrap();

    let record = RecordingRepository::get(&conn, id).unwrap().unwrap();
    assert_eq!(record.call_id, "call-1");
    assert_eq!(record.call_type, "audio");
    assert_eq!(record.duration_seconds, 312);
    assert_eq!(record.recording_id.as_deref(), Some("rec-call-1"));
    assert!(!record.stopped_at.is_empty());

    assert!(RecordingRepository::get(&conn, 9999).unwrap().is_none());
}

#[test]
fn test_insert_without_artifact_fields() {
    // A flush timeout leaves no recording id or file URL; the row still
    // records that the session happened.
    let conn = setup_test_db().unwrap();
    let recording = NewRecording {
        recording_id: None,
        file_url: None,
        ..sample_recording("call-2")
    };

    let id = RecordingRepository::insert(&conn, &recording).unwrap();
    let record = RecordingRepository::get(&conn, id).unwrap().unwrap();
    assert!(record.recording_id.is_none());
    assert!(record.file_url.is_none());
}

#[test]
fn test_list_recordings_respects_limit() {
    let conn = setup_test_db().unwrap();

    for i in 1..=5 {
        RecordingRepository::insert(&conn, &sample_recording(&format!("call-{i}"))).unwrap();
    }

    let records = RecordingRepository::list(&conn, 3).unwrap();
    assert_eq!(records.len(), 3);

    // Newest first.
    assert_eq!(records[0].call_id, "call-5");
}
