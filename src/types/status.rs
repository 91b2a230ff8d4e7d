//! Observable per-source state

use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of one monitored recording, published by its driver task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub path: PathBuf,
    /// Byte offset of the next unread record header
    pub offset: u64,
    pub frames: u64,
    pub clips: u64,
    /// Driver task has ended (removed, end of file, or malformed stream)
    pub finished: bool,
    /// Why the stream ended, if it ended on bad data
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0, frames: 0, clips: 0, finished: false, error: None }
    }
}
