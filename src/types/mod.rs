//! Core value types that flow through the broadcast pipeline.
//!
//! ## Architecture
//!
//! - [`Frame`] is one decoded ttyrec record, its time relative to the first frame of the source
//! - [`Clip`] is a sealed window of one source: `(delay, payload)` pairs ready for playback
//! - [`Pacing`] decides how recorded delays are reproduced on the wire
//! - [`SourceStatus`] is the observable state of one monitored recording
//!
//! Payloads are shared through `Arc<[u8]>` so a clip handed to several viewers
//! during replay is never copied.
//!
//! ```rust
//! use ttyrec_tv::types::{Clip, ClipFrame};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let clip = Clip::new(
//!     Arc::new(PathBuf::from("/tmp/demo.tty")),
//!     0,
//!     vec![ClipFrame::new(0.0, b"$ ls".to_vec()), ClipFrame::new(0.5, b"\r\n".to_vec())],
//! );
//! assert_eq!(clip.len(), 2);
//! assert!((clip.duration() - 0.5).abs() < f64::EPSILON);
//! ```

mod clip;
mod frame;
mod pacing;
mod status;

pub use clip::{Clip, ClipFrame};
pub use frame::Frame;
pub use pacing::Pacing;
pub use status::SourceStatus;
