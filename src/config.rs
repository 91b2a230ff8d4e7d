//! Broadcaster configuration
//!
//! Every field has a default so a YAML file only needs the values it changes:
//!
//! ```yaml
//! listen: 127.0.0.1:2323
//! window_seconds: 20
//! pacing:
//!   capped: 2.0
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::distributor::{DEFAULT_MAX_READY, DEFAULT_REPLAY_CAPACITY};
use crate::providers::Backoff;
use crate::session::DEFAULT_RESET_SEQUENCE;
use crate::ttyrec::DEFAULT_MAX_PAYLOAD_LEN;
use crate::types::Pacing;
use crate::window::DEFAULT_WINDOW_SECONDS;
use crate::{BroadcastError, Result};

/// Default TCP endpoint for viewers
pub const DEFAULT_LISTEN: &str = "0.0.0.0:2323";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcastConfig {
    pub listen: SocketAddr,
    pub window_seconds: f64,
    pub replay_capacity: usize,
    pub max_ready: usize,
    pub scan_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub max_payload_len: u32,
    /// Written as `recorded`, `capped: <secs>` or `scaled: <factor>`
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub pacing: Pacing,
    pub reset_sequence: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 2323)),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            max_ready: DEFAULT_MAX_READY,
            scan_interval_ms: 1000,
            poll_interval_ms: 100,
            max_poll_interval_ms: 1000,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            pacing: Pacing::Recorded,
            reset_sequence: String::from_utf8_lossy(DEFAULT_RESET_SEQUENCE).into_owned(),
        }
    }
}

impl BroadcastConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| BroadcastError::config(format!("YAML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| BroadcastError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the broadcaster cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(BroadcastError::config(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if self.replay_capacity == 0 {
            return Err(BroadcastError::config("replay_capacity must be at least 1"));
        }
        if self.max_ready == 0 {
            return Err(BroadcastError::config("max_ready must be at least 1"));
        }
        if self.scan_interval_ms == 0 || self.poll_interval_ms == 0 {
            return Err(BroadcastError::config("scan and poll intervals must be non-zero"));
        }
        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(BroadcastError::config(format!(
                "max_poll_interval_ms ({}) is below poll_interval_ms ({})",
                self.max_poll_interval_ms, self.poll_interval_ms
            )));
        }
        if self.max_payload_len == 0 {
            return Err(BroadcastError::config("max_payload_len must be non-zero"));
        }
        match self.pacing {
            Pacing::Recorded => {}
            Pacing::Capped(max) if max.is_finite() && max > 0.0 => {}
            Pacing::Scaled(k) if k.is_finite() && k > 0.0 && k <= 1.0 => {}
            other => {
                return Err(BroadcastError::config(format!("unusable pacing {:?}", other)));
            }
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Tail backoff built from the poll interval settings
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.max_poll_interval_ms),
        )
    }

    pub fn reset_bytes(&self) -> Arc<[u8]> {
        Arc::from(self.reset_sequence.as_bytes())
    }
}
