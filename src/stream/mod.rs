//! Stream combinators for playback

pub mod paced;

pub use paced::{Paced, PacedExt};
