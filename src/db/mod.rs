pub mod init;
pub mod recordings;

#[cfg(test)]
mod tests;

pub use init::{init_db, migrate};
pub use recordings::{NewRecording, RecordingRecord, RecordingRepository};
