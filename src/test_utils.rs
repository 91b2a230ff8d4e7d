//! Test utilities for building synthetic recordings
//!
//! Recordings are produced in the exact on-disk ttyrec layout so tests and
//! benchmarks exercise the same reader paths as real `ttyrec` output.

#![cfg(any(test, feature = "benchmark"))]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::ttyrec::RecordHeader;

/// Encode one record in on-disk layout
pub fn encode_record(seconds: u32, microseconds: u32, payload: &[u8]) -> Vec<u8> {
    let header = RecordHeader { seconds, microseconds, length: payload.len() as u32 };
    let mut bytes = Vec::with_capacity(12 + payload.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Append raw bytes to a file, creating it if needed
pub fn append_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

/// Builder for a recording whose frames are given relative to a start time
#[derive(Debug, Clone)]
pub struct RecordingBuilder {
    start: f64,
    bytes: Vec<u8>,
    frames: usize,
}

impl RecordingBuilder {
    /// Start a recording at absolute time `start` (seconds)
    pub fn new(start: f64) -> Self {
        Self { start, bytes: Vec::new(), frames: 0 }
    }

    /// Add a frame `offset` seconds after the start
    pub fn frame(mut self, offset: f64, payload: &[u8]) -> Self {
        let absolute = self.start + offset;
        let seconds = absolute.floor();
        let micros = ((absolute - seconds) * 1_000_000.0).round().min(999_999.0);
        self.bytes.extend(encode_record(seconds as u32, micros as u32, payload));
        self.frames += 1;
        self
    }

    /// Add `count` frames spaced `interval` seconds apart, starting at `offset`
    pub fn frames_every(mut self, offset: f64, interval: f64, count: usize) -> Self {
        for i in 0..count {
            let payload = format!("frame {}\r\n", i);
            self = self.frame(offset + interval * i as f64, payload.as_bytes());
        }
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttyrec::{ReadOutcome, TtyrecReader};

    #[test]
    fn builder_output_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("built.tty");
        let builder = RecordingBuilder::new(1_000.25).frames_every(0.0, 1.0, 5);
        assert_eq!(builder.frame_count(), 5);
        builder.write_to(&path).expect("write");

        let mut reader = TtyrecReader::new(&path);
        let mut times = Vec::new();
        while let ReadOutcome::Frame(frame) = reader.read_frame().expect("read") {
            times.push(frame.time);
        }
        assert_eq!(times.len(), 5);
        for (i, time) in times.iter().enumerate() {
            assert!((time - i as f64).abs() < 1e-6);
        }
        assert_eq!(reader.offset(), builder.bytes().len() as u64);
    }

    #[test]
    fn encode_record_layout() {
        let bytes = encode_record(1, 2, b"xyz");
        assert_eq!(bytes.len(), 15);
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..], b"xyz");
    }
}
