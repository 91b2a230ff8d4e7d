//! Fixed-duration window assembly
//!
//! A [`WindowAssembler`] turns one source's frame stream into clips. Frames are
//! bucketed by `floor(time / window_seconds)`; the clip being accumulated is
//! sealed as soon as a frame from a later window arrives, or when the stream
//! ends. Absolute relative-time becomes inter-frame delay on the way in.
//!
//! ```rust
//! use ttyrec_tv::window::WindowAssembler;
//! use ttyrec_tv::types::Frame;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let mut assembler = WindowAssembler::new(Arc::new(PathBuf::from("/tmp/a.tty")), 30.0);
//! assert!(assembler.push(Frame::new(29.9, b"a".to_vec())).is_none());
//! let sealed = assembler.push(Frame::new(30.1, b"b".to_vec())).expect("window 0 sealed");
//! assert_eq!(sealed.len(), 1);
//! assert_eq!(assembler.finish().expect("window 1 flushed").len(), 1);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::types::{Clip, ClipFrame, Frame};

/// Default window duration in seconds
pub const DEFAULT_WINDOW_SECONDS: f64 = 30.0;

/// Groups a frame stream into per-window clips
#[derive(Debug)]
pub struct WindowAssembler {
    source: Arc<PathBuf>,
    window_seconds: f64,
    current_window: Option<u64>,
    prev_time: Option<f64>,
    pending: Vec<ClipFrame>,
    sealed: u64,
}

impl WindowAssembler {
    /// Create an assembler for one source.
    ///
    /// Non-positive or non-finite window lengths fall back to
    /// [`DEFAULT_WINDOW_SECONDS`].
    pub fn new(source: Arc<PathBuf>, window_seconds: f64) -> Self {
        let window_seconds = if window_seconds.is_finite() && window_seconds > 0.0 {
            window_seconds
        } else {
            DEFAULT_WINDOW_SECONDS
        };
        Self {
            source,
            window_seconds,
            current_window: None,
            prev_time: None,
            pending: Vec::new(),
            sealed: 0,
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    /// Frames accumulated in the open window
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of clips sealed so far
    pub fn sealed(&self) -> u64 {
        self.sealed
    }

    /// Add a frame, returning the previous window's clip if this frame closed it
    pub fn push(&mut self, frame: Frame) -> Option<Clip> {
        let index = frame.window_index(self.window_seconds);
        let delay = match self.prev_time {
            Some(prev) => (frame.time - prev).max(0.0),
            None => 0.0,
        };

        let sealed = match self.current_window {
            Some(current) if index > current => {
                self.current_window = Some(index);
                self.seal(current)
            }
            Some(_) => None,
            None => {
                self.current_window = Some(index);
                None
            }
        };

        self.pending.push(ClipFrame::shared(delay, frame.payload));
        self.prev_time = Some(frame.time);
        sealed
    }

    /// Seal whatever is left at end of stream
    pub fn finish(&mut self) -> Option<Clip> {
        let window = self.current_window?;
        self.seal(window)
    }

    fn seal(&mut self, window: u64) -> Option<Clip> {
        if self.pending.is_empty() {
            return None;
        }
        let frames = std::mem::take(&mut self.pending);
        self.sealed += 1;
        debug!(
            path = %self.source.display(),
            window,
            frames = frames.len(),
            "Sealed clip"
        );
        Some(Clip::new(Arc::clone(&self.source), window, frames))
    }
}
