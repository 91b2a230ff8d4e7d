//! One-shot provider for finished recordings

use std::path::Path;
use tracing::{debug, info};

use crate::provider::FrameProvider;
use crate::ttyrec::{ReadOutcome, TtyrecReader};
use crate::types::Frame;
use crate::{BroadcastError, Result};

/// Provider that parses a static recording once and then ends
///
/// A record cut short at the end of the file is malformed here, since
/// nothing will ever complete it.
pub struct ReplayProvider {
    reader: TtyrecReader,
}

impl ReplayProvider {
    /// Create a replay provider, failing if the file cannot be opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_reader(TtyrecReader::new(path))
    }

    pub fn with_reader(reader: TtyrecReader) -> Result<Self> {
        let path = reader.path().to_path_buf();
        let len = std::fs::metadata(&path).map_err(|e| BroadcastError::file_error(path.clone(), e))?.len();
        info!(path = %path.display(), bytes = len, "Opened recording for replay");
        Ok(Self { reader })
    }
}

#[async_trait::async_trait]
impl FrameProvider for ReplayProvider {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.reader.read_frame()? {
            ReadOutcome::Frame(frame) => Ok(Some(frame)),
            ReadOutcome::EndOfData => {
                debug!(
                    path = %self.reader.path().display(),
                    frames = self.reader.frames_read(),
                    "Reached end of recording"
                );
                Ok(None)
            }
            ReadOutcome::Partial { have, need } => Err(BroadcastError::malformed(
                self.reader.path().to_path_buf(),
                self.reader.offset(),
                format!("truncated record: {} of {} bytes present", have, need),
            )),
        }
    }

    fn path(&self) -> &Path {
        self.reader.path()
    }

    fn offset(&self) -> u64 {
        self.reader.offset()
    }
}
