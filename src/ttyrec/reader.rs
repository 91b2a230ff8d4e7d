//! Offset-tracked ttyrec reader
//!
//! [`TtyrecReader`] decodes one record per call and only advances its offset
//! once both header and payload were read in full. A short read means the
//! writer has not produced the rest of the record yet, so the next call
//! starts again from the same header.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ttyrec_tv::ttyrec::{ReadOutcome, TtyrecReader};
//!
//! fn dump() -> ttyrec_tv::Result<()> {
//!     let mut reader = TtyrecReader::new("/tmp/session.tty");
//!     while let ReadOutcome::Frame(frame) = reader.read_frame()? {
//!         println!("{:.3}s: {} bytes", frame.time, frame.payload.len());
//!     }
//!     println!("stopped at offset {}", reader.offset());
//!     Ok(())
//! }
//! ```

use super::format::{DEFAULT_MAX_PAYLOAD_LEN, RECORD_HEADER_SIZE, RecordHeader};
use crate::types::Frame;
use crate::{BroadcastError, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Result of one read attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A complete record was decoded and the offset advanced past it
    Frame(Frame),

    /// No bytes exist past the current offset
    EndOfData,

    /// Part of a record is present; `have` of `need` bytes are available
    Partial { have: u64, need: u64 },
}

/// Incremental reader for one recording file
pub struct TtyrecReader {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    base_time: Option<f64>,
    last_time: Option<f64>,
    max_payload_len: u32,
    frames_read: u64,
}

impl TtyrecReader {
    /// Create a reader positioned at the start of `path`.
    ///
    /// The file is opened lazily on the first read so that a recording which
    /// does not exist yet can still be monitored.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            offset: 0,
            base_time: None,
            last_time: None,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            frames_read: 0,
        }
    }

    /// Override the implausible-length threshold
    pub fn with_max_payload_len(mut self, max_payload_len: u32) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next unread record header
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Absolute timestamp of the first frame, once one has been read
    pub fn base_time(&self) -> Option<f64> {
        self.base_time
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Drop the open file handle; the next read reopens the path
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Whether the path now names a different file than the open handle
    ///
    /// ttyrec recreates its output file when restarted with the same name;
    /// the old handle then only ever sees the unlinked recording.
    #[cfg(unix)]
    pub fn is_replaced(&self) -> bool {
        use std::os::unix::fs::MetadataExt;

        let Some(file) = self.file.as_ref() else {
            return false;
        };
        match (file.metadata(), std::fs::metadata(&self.path)) {
            (Ok(open), Ok(current)) => open.dev() != current.dev() || open.ino() != current.ino(),
            // Unlinked and not yet recreated: nothing new to follow
            _ => false,
        }
    }

    #[cfg(not(unix))]
    pub fn is_replaced(&self) -> bool {
        false
    }

    /// Attempt to decode the record at the current offset
    pub fn read_frame(&mut self) -> Result<ReadOutcome> {
        let path = self.path.clone();
        let offset = self.offset;
        if self.file.is_none() {
            let opened = File::open(&path).map_err(|e| BroadcastError::file_error(path.clone(), e))?;
            self.file = Some(opened);
        }
        let Some(file) = self.file.as_mut() else {
            return Err(BroadcastError::file_error(path, ErrorKind::NotFound.into()));
        };

        let file_len =
            file.metadata().map_err(|e| BroadcastError::file_error(path.clone(), e))?.len();
        if file_len < offset {
            // Same path reused by a fresh recording: earlier offsets no longer line up
            return Err(BroadcastError::malformed(
                path,
                offset,
                format!("file shrank to {} bytes below read offset", file_len),
            ));
        }

        let available = file_len - offset;
        if available == 0 {
            return Ok(ReadOutcome::EndOfData);
        }
        if available < RECORD_HEADER_SIZE as u64 {
            return Ok(ReadOutcome::Partial { have: available, need: RECORD_HEADER_SIZE as u64 });
        }

        file.seek(SeekFrom::Start(offset)).map_err(|e| BroadcastError::file_error(path.clone(), e))?;

        let mut header_bytes = [0u8; RECORD_HEADER_SIZE];
        let got = read_up_to(file, &mut header_bytes)
            .map_err(|e| BroadcastError::file_error(path.clone(), e))?;
        if got < RECORD_HEADER_SIZE {
            return Ok(ReadOutcome::Partial { have: got as u64, need: RECORD_HEADER_SIZE as u64 });
        }

        let header = RecordHeader::parse(&header_bytes);
        header
            .validate(self.max_payload_len)
            .map_err(|details| BroadcastError::malformed(path.clone(), offset, details))?;

        let need = header.record_len();
        if available < need {
            trace!(path = %path.display(), offset, have = available, need, "Record incomplete");
            return Ok(ReadOutcome::Partial { have: available, need });
        }

        let mut payload = vec![0u8; header.length as usize];
        let got =
            read_up_to(file, &mut payload).map_err(|e| BroadcastError::file_error(path.clone(), e))?;
        if got < payload.len() {
            return Ok(ReadOutcome::Partial {
                have: RECORD_HEADER_SIZE as u64 + got as u64,
                need,
            });
        }

        let timestamp = header.timestamp();
        let base = *self.base_time.get_or_insert(timestamp);
        let time = timestamp - base;

        if let Some(previous) = self.last_time {
            if time < previous {
                return Err(BroadcastError::OutOfOrder { path, offset, previous, current: time });
            }
        }

        if self.frames_read == 0 {
            debug!(path = %path.display(), base_time = base, "First frame read");
        }

        self.last_time = Some(time);
        self.offset = offset
            .checked_add(need)
            .ok_or_else(|| BroadcastError::malformed(path, offset, "offset overflowed"))?;
        self.frames_read += 1;

        Ok(ReadOutcome::Frame(Frame::new(time, payload)))
    }
}

/// Fill as much of `buf` as the file currently holds
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
