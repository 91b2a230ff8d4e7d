//! Provider trait for frame sources

use crate::Result;
use crate::types::Frame;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

/// Trait for recording frame sources
///
/// Providers own the reading side of one recording and handle their own
/// waiting internally, the same way for a live file being tailed and a
/// static file parsed once.
#[async_trait::async_trait]
pub trait FrameProvider: Send + 'static {
    /// Get the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Stream ended (normal termination)
    /// - `Err(e)` - The stream is unusable; the source must stop
    ///
    /// Reading a record never spans an await point, so dropping this future
    /// between frames never loses or duplicates a record.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// A frame that is already complete on disk, without waiting for more
    ///
    /// Used when a source is being stopped: whatever the writer finished
    /// before it exited is still delivered. `Ok(None)` means nothing more is
    /// ready right now.
    fn try_next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }

    /// Recording this provider reads
    fn path(&self) -> &Path;

    /// Byte offset of the next unread record
    fn offset(&self) -> u64;

    /// Optional hint used to cut a pending wait short when the file changed
    fn wake_hint(&self) -> Option<Arc<Notify>> {
        None
    }
}
