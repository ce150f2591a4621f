//! API route modules.

pub mod logs;
pub mod queue;
pub mod recording;
