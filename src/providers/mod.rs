//! Frame providers for recordings
//!
//! - [`TailProvider`] follows a file that is still being written
//! - [`ReplayProvider`] parses a finished file once

pub mod replay;
pub mod tail;

pub use replay::ReplayProvider;
pub use tail::{Backoff, TailProvider};
