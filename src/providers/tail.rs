//! Tailing provider for recordings that are still being written

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, trace};

use crate::Result;
use crate::provider::FrameProvider;
use crate::ttyrec::{ReadOutcome, TtyrecReader};
use crate::types::Frame;

/// Exponential backoff between polls of a quiet file
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self { base, max, current: base }
    }

    /// Delay for the next wait, doubling up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1))
    }
}

/// Provider that follows a live recording
///
/// Short reads and a missing file are transient: the provider waits with
/// backoff, or until [`FrameProvider::wake_hint`] is notified, and retries from
/// the same offset. Only malformed data ends the stream.
pub struct TailProvider {
    reader: TtyrecReader,
    backoff: Backoff,
    wake: Arc<Notify>,
    waiting_logged: bool,
}

impl TailProvider {
    /// Create a tailing provider starting at the beginning of `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_reader(TtyrecReader::new(path), Backoff::default())
    }

    /// Create a tailing provider from a configured reader
    pub fn with_reader(reader: TtyrecReader, backoff: Backoff) -> Self {
        Self { reader, backoff, wake: Arc::new(Notify::new()), waiting_logged: false }
    }

    async fn wait(&mut self) {
        let delay = self.backoff.next_delay();
        let woken = tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.wake.notified() => true,
        };
        if woken {
            trace!(path = %self.reader.path().display(), "Woken by file change hint");
            self.backoff.reset();
        }
    }
}

#[async_trait::async_trait]
impl FrameProvider for TailProvider {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.reader.read_frame() {
                Ok(ReadOutcome::Frame(frame)) => {
                    self.backoff.reset();
                    self.waiting_logged = false;
                    return Ok(Some(frame));
                }
                Ok(ReadOutcome::EndOfData) => {
                    if self.reader.is_replaced() {
                        info!(
                            path = %self.reader.path().display(),
                            "Recording replaced by a new file, ending this stream"
                        );
                        return Ok(None);
                    }
                }
                Ok(ReadOutcome::Partial { have, need }) => {
                    trace!(
                        path = %self.reader.path().display(),
                        offset = self.reader.offset(),
                        have,
                        need,
                        "Waiting for rest of record"
                    );
                }
                Err(e) if e.is_retryable() => {
                    if !self.waiting_logged {
                        info!(path = %self.reader.path().display(), "Recording not readable yet: {}", e);
                        self.waiting_logged = true;
                    } else {
                        debug!(path = %self.reader.path().display(), "Still unreadable: {}", e);
                    }
                    self.reader.close();
                }
                Err(e) => return Err(e),
            }

            self.wait().await;
        }
    }

    fn try_next_frame(&mut self) -> Result<Option<Frame>> {
        match self.reader.read_frame() {
            Ok(ReadOutcome::Frame(frame)) => Ok(Some(frame)),
            Ok(ReadOutcome::EndOfData | ReadOutcome::Partial { .. }) => Ok(None),
            Err(e) if e.is_retryable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn path(&self) -> &Path {
        self.reader.path()
    }

    fn offset(&self) -> u64 {
        self.reader.offset()
    }

    fn wake_hint(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.wake))
    }
}
