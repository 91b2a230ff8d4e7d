//! Operator control requests
//!
//! Requests and responses are plain serde types so any transport can carry
//! them. [`ControlRequest::from_line`] accepts the short text form used on a
//! console: `list`, `queue`, `drain`, `stats`, `enqueue <path>`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::broadcaster::Broadcaster;
use crate::distributor::DistributorStats;
use crate::types::SourceStatus;
use crate::{BroadcastError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Every monitored recording with its progress
    ListSources,
    /// Fresh clips waiting for a viewer
    QueueDepth,
    /// Discard the ready queue (the replay pool is kept)
    Drain,
    /// Parse a finished recording once into the distributor
    Enqueue { path: PathBuf },
    Stats,
}

impl ControlRequest {
    /// Parse the one-line console form
    pub fn from_line(line: &str) -> Result<Self> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let request = match (command, rest) {
            ("list" | "sources", "") => ControlRequest::ListSources,
            ("queue" | "depth", "") => ControlRequest::QueueDepth,
            ("drain", "") => ControlRequest::Drain,
            ("stats", "") => ControlRequest::Stats,
            ("enqueue" | "add", path) if !path.is_empty() => {
                ControlRequest::Enqueue { path: PathBuf::from(path) }
            }
            _ => return Err(BroadcastError::config(format!("unknown control command '{}'", line))),
        };
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum ControlResponse {
    Sources { sources: Vec<SourceStatus> },
    QueueDepth { depth: usize },
    Drained { dropped: usize },
    Enqueued { path: PathBuf },
    Stats {
        #[serde(flatten)]
        counters: DistributorStats,
        queue_depth: usize,
        waiting: usize,
        pool_len: usize,
    },
    Error { message: String },
}

impl Broadcaster {
    /// Execute one control request
    ///
    /// Failures are reported in the response rather than returned, so a bad
    /// request never takes down whatever transport delivered it.
    pub fn handle_control(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::ListSources => ControlResponse::Sources { sources: self.list_sources() },
            ControlRequest::QueueDepth => ControlResponse::QueueDepth { depth: self.queue_depth() },
            ControlRequest::Drain => ControlResponse::Drained { dropped: self.drain_queue() },
            ControlRequest::Enqueue { path } => match self.enqueue_file(&path) {
                Ok(()) => ControlResponse::Enqueued { path },
                Err(e) => ControlResponse::Error { message: e.to_string() },
            },
            ControlRequest::Stats => {
                let distributor = self.distributor();
                ControlResponse::Stats {
                    counters: distributor.stats(),
                    queue_depth: distributor.queue_depth(),
                    waiting: distributor.waiting(),
                    pool_len: distributor.pool_len(),
                }
            }
        }
    }
}
