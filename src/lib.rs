//! Broadcast live ttyrec terminal recordings to TCP viewers.
//!
//! Recordings that are still being written are tailed, cut into fixed-length
//! time windows ("clips") and handed out to connected viewers. Each viewer
//! sees one clip at a time, replayed with its recorded timing and preceded by
//! a terminal reset. When nothing new has been recorded, viewers are shown a
//! random recent clip instead of a frozen screen.
//!
//! # Architecture
//!
//! - [`ttyrec::TtyrecReader`] parses records incrementally, tolerating a
//!   writer that is mid-record.
//! - A [`FrameProvider`] (tailing or one-shot) feeds one
//!   [`driver::SourceDriver`] task per recording.
//! - [`window::WindowAssembler`] seals clips at window boundaries.
//! - [`distributor::ClipDistributor`] queues fresh clips and keeps a replay
//!   pool; it never blocks publishers.
//! - [`server::BroadcastServer`] runs one [`session::BroadcastSession`] per
//!   viewer.
//! - [`broadcaster::Broadcaster`] starts and stops drivers as
//!   [`discovery`] reports recordings appearing and disappearing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use ttyrec_tv::{BroadcastConfig, Broadcaster, discovery::ProcScanner, server::BroadcastServer};
//!
//! #[tokio::main]
//! async fn main() -> ttyrec_tv::Result<()> {
//!     let config = BroadcastConfig::default();
//!     let broadcaster = Arc::new(Broadcaster::new(config.clone())?);
//!     let server = BroadcastServer::bind(
//!         config.listen,
//!         broadcaster.distributor(),
//!         config.pacing,
//!         config.reset_bytes(),
//!     )
//!     .await?;
//!
//!     let cancel = CancellationToken::new();
//!     let discovery = {
//!         let broadcaster = Arc::clone(&broadcaster);
//!         let cancel = cancel.clone();
//!         tokio::spawn(async move { broadcaster.run_discovery(ProcScanner::default(), cancel).await })
//!     };
//!     server.run(cancel).await?;
//!     let _ = discovery.await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Recording input
pub mod driver;
pub mod provider;
pub mod providers;
pub mod ttyrec;
pub mod window;

// Distribution and viewers
pub mod distributor;
pub mod server;
pub mod session;
pub mod stream;

// Lifecycle and operation
pub mod broadcaster;
pub mod config;
pub mod control;
pub mod discovery;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use broadcaster::Broadcaster;
pub use config::BroadcastConfig;
pub use control::{ControlRequest, ControlResponse};
pub use distributor::ClipDistributor;
pub use provider::FrameProvider;
