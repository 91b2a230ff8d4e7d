//! ttyrec recording support
//!
//! A ttyrec file is a bare sequence of records, each a 12-byte little-endian
//! header (`seconds`, `microseconds`, `length`) followed by `length` bytes of
//! terminal output. There is no file header, and the end of data currently
//! written is indistinguishable from the end of the file.

pub mod format;
pub mod reader;

pub use format::{DEFAULT_MAX_PAYLOAD_LEN, RECORD_HEADER_SIZE, RecordHeader};
pub use reader::{ReadOutcome, TtyrecReader};
