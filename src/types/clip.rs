//! Sealed playback windows

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One `(delay, payload)` pair of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipFrame {
    /// Seconds to wait after the previous frame before writing `payload`
    pub delay: f64,

    /// Terminal output bytes
    pub payload: Arc<[u8]>,
}

impl ClipFrame {
    /// Create a clip frame from owned bytes
    pub fn new(delay: f64, payload: Vec<u8>) -> Self {
        Self { delay, payload: payload.into() }
    }

    /// Create a clip frame sharing an existing payload
    pub fn shared(delay: f64, payload: Arc<[u8]>) -> Self {
        Self { delay, payload }
    }

    /// The recorded delay as a `Duration`, negative delays clamp to zero
    pub fn delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay.max(0.0))
    }
}

/// A sealed, immutable window of one source's output.
///
/// Cloning is cheap: the frame list is shared, which is what lets the replay
/// pool hand the same clip to several viewers at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    source: Arc<PathBuf>,
    window: u64,
    frames: Arc<[ClipFrame]>,
}

impl Clip {
    /// Create a new clip
    pub fn new(source: Arc<PathBuf>, window: u64, frames: Vec<ClipFrame>) -> Self {
        Self { source, window, frames: frames.into() }
    }

    /// Recording this clip was cut from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Window index within the source
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Frames in playback order
    pub fn frames(&self) -> &[ClipFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of recorded delays in seconds
    pub fn duration(&self) -> f64 {
        self.frames.iter().map(|f| f.delay.max(0.0)).sum()
    }

    /// Total payload bytes
    pub fn byte_len(&self) -> usize {
        self.frames.iter().map(|f| f.payload.len()).sum()
    }

    /// Whether two handles refer to the same sealed clip
    pub fn same_clip(&self, other: &Clip) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }
}
