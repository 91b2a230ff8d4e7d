//! ttyrec record header layout
//!
//! ```text
//! offset 0   u32 LE  seconds
//! offset 4   u32 LE  microseconds
//! offset 8   u32 LE  payload length
//! offset 12  payload (length bytes)
//! ```

/// Size of one record header in bytes
pub const RECORD_HEADER_SIZE: usize = 12;

/// Largest payload accepted before a record is considered corrupt
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

const MICROS_PER_SECOND: u32 = 1_000_000;

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub seconds: u32,
    pub microseconds: u32,
    pub length: u32,
}

impl RecordHeader {
    /// Decode a header from its on-disk bytes
    pub fn parse(bytes: &[u8; RECORD_HEADER_SIZE]) -> Self {
        Self {
            seconds: parse_u32_le(bytes, 0),
            microseconds: parse_u32_le(bytes, 4),
            length: parse_u32_le(bytes, 8),
        }
    }

    /// Encode the header in on-disk layout
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut bytes = [0u8; RECORD_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.seconds.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.microseconds.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    /// Absolute timestamp in seconds
    pub fn timestamp(&self) -> f64 {
        self.seconds as f64 + self.microseconds as f64 / MICROS_PER_SECOND as f64
    }

    /// Total bytes occupied by the record, header included
    pub fn record_len(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.length as u64
    }

    /// Check the header for values no ttyrec writer produces.
    ///
    /// Returns a description of the problem when the record is implausible.
    pub fn validate(&self, max_payload_len: u32) -> Result<(), String> {
        if self.length > max_payload_len {
            return Err(format!(
                "declared payload length {} exceeds limit of {} bytes",
                self.length, max_payload_len
            ));
        }
        if self.microseconds >= MICROS_PER_SECOND {
            return Err(format!("microsecond field {} out of range", self.microseconds));
        }
        Ok(())
    }
}

fn parse_u32_le(data: &[u8; RECORD_HEADER_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
