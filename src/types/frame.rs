//! Decoded recording frames

use std::sync::Arc;

/// One terminal output record read from a recording.
///
/// `time` is in seconds relative to the first frame ever read from the
/// source, so the first frame of every source is at `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Seconds since the first frame of this source
    pub time: f64,

    /// Raw terminal output bytes (zero-copy via Arc)
    pub payload: Arc<[u8]>,
}

impl Frame {
    /// Create a new frame
    pub fn new(time: f64, payload: Vec<u8>) -> Self {
        Self { time, payload: payload.into() }
    }

    /// Index of the fixed-duration window this frame falls into
    pub fn window_index(&self, window_seconds: f64) -> u64 {
        (self.time / window_seconds).floor().max(0.0) as u64
    }
}
