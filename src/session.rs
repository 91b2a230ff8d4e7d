//! Per-viewer broadcast session
//!
//! A session pulls clips from the shared [`ClipDistributor`] and writes them to
//! one viewer, reproducing recorded timing through [`Paced`](crate::stream::Paced).
//! Each clip starts with a terminal reset so viewers never see the tail of a
//! previous screen mixed into the next one.
//!
//! Sessions only ever fail on their own connection. A clip dequeued by a
//! session that dies is simply dropped for that session.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::distributor::ClipDistributor;
use crate::stream::PacedExt;
use crate::types::{Clip, Pacing};
use crate::{BroadcastError, Result};

/// Full terminal reset (RIS)
pub const DEFAULT_RESET_SEQUENCE: &[u8] = b"\x1bc";

/// What a session delivered before it ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub clips: u64,
    pub frames: u64,
    pub bytes: u64,
}

/// Streams clips to one viewer
pub struct BroadcastSession<W> {
    id: u64,
    writer: W,
    distributor: Arc<ClipDistributor>,
    pacing: Pacing,
    reset: Arc<[u8]>,
    stats: SessionStats,
}

impl<W> BroadcastSession<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(id: u64, writer: W, distributor: Arc<ClipDistributor>, pacing: Pacing) -> Self {
        Self {
            id,
            writer,
            distributor,
            pacing: pacing.normalize(),
            reset: Arc::from(DEFAULT_RESET_SEQUENCE),
            stats: SessionStats::default(),
        }
    }

    /// Replace the control sequence written before each clip
    pub fn with_reset_sequence(mut self, reset: Arc<[u8]>) -> Self {
        self.reset = reset;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run until `cancel` fires or the connection fails.
    ///
    /// Cancellation is a normal end and returns the stats gathered so far.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<SessionStats> {
        debug!(session = self.id, "Session started");
        let reset = Arc::clone(&self.reset);
        self.write(&reset).await?;

        loop {
            let clip = tokio::select! {
                _ = cancel.cancelled() => break,
                clip = self.distributor.next() => clip,
            };

            if !self.play(&clip, &cancel).await? {
                break;
            }
        }

        debug!(session = self.id, clips = self.stats.clips, bytes = self.stats.bytes, "Session ended");
        Ok(self.stats)
    }

    /// Play one clip; returns `false` if cancelled part-way through
    async fn play(&mut self, clip: &Clip, cancel: &CancellationToken) -> Result<bool> {
        trace!(
            session = self.id,
            path = %clip.source().display(),
            window = clip.window(),
            frames = clip.len(),
            "Playing clip"
        );
        let reset = Arc::clone(&self.reset);
        self.write(&reset).await?;

        let mut frames = Box::pin(futures::stream::iter(clip.frames().to_vec()).paced(self.pacing));
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                payload = frames.next() => payload,
            };
            let Some(payload) = payload else { break };
            self.write(&payload).await?;
            self.stats.frames += 1;
        }

        self.stats.clips += 1;
        Ok(true)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let id = self.id;
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| BroadcastError::connection_failed(format!("session {} write", id), e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| BroadcastError::connection_failed(format!("session {} flush", id), e))?;
        self.stats.bytes += bytes.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClipFrame;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn clip(window: u64, frames: Vec<(f64, &[u8])>) -> Clip {
        Clip::new(
            Arc::new(PathBuf::from("/tmp/session.tty")),
            window,
            frames.into_iter().map(|(d, p)| ClipFrame::new(d, p.to_vec())).collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn writes_reset_then_paced_payloads() {
        let distributor = Arc::new(ClipDistributor::default());
        distributor.publish(clip(0, vec![(0.0, &b"hello"[..]), (2.0, &b" world"[..])]));

        let (client, mut viewer) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let session = BroadcastSession::new(1, client, Arc::clone(&distributor), Pacing::Recorded);
        let task = tokio::spawn(session.run(cancel.clone()));

        let mut expected = Vec::new();
        expected.extend_from_slice(DEFAULT_RESET_SEQUENCE);
        expected.extend_from_slice(DEFAULT_RESET_SEQUENCE);
        expected.extend_from_slice(b"hello");
        let mut buf = vec![0u8; expected.len()];
        viewer.read_exact(&mut buf).await.expect("reset and first frame");
        assert_eq!(buf, expected);

        let start = tokio::time::Instant::now();
        let mut second = vec![0u8; 6];
        viewer.read_exact(&mut second).await.expect("second frame");
        assert_eq!(&second, b" world");
        assert!(start.elapsed() >= Duration::from_secs(2));

        cancel.cancel();
        let stats = task.await.expect("task").expect("session result");
        assert!(stats.clips >= 1);
        assert!(stats.frames >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_channel_replays_recent_clip() {
        let distributor = Arc::new(ClipDistributor::default());
        distributor.publish(clip(0, vec![(0.0, &b"only"[..])]));
        assert!(distributor.try_next().is_some());

        let (client, mut viewer) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let session = BroadcastSession::new(2, client, Arc::clone(&distributor), Pacing::Recorded)
            .with_reset_sequence(Arc::from(&b"|"[..]));
        let task = tokio::spawn(session.run(cancel.clone()));

        let mut buf = vec![0u8; 1 + 3 * 5];
        viewer.read_exact(&mut buf).await.expect("replayed clips");
        assert_eq!(&buf, b"||only|only|only");

        cancel.cancel();
        task.await.expect("task").expect("session result");
        assert!(distributor.stats().replayed >= 3);
    }

    #[tokio::test]
    async fn closed_viewer_ends_only_that_session() {
        let distributor = Arc::new(ClipDistributor::default());
        distributor.publish(clip(0, vec![(0.0, &b"data"[..])]));

        let (client, viewer) = tokio::io::duplex(64);
        drop(viewer);
        let session = BroadcastSession::new(3, client, Arc::clone(&distributor), Pacing::Recorded);
        let result = tokio::time::timeout(Duration::from_secs(1), session.run(CancellationToken::new()))
            .await
            .expect("session must notice the closed connection");
        assert!(matches!(result, Err(BroadcastError::Connection { .. })));

        assert!(distributor.try_next().is_some(), "distributor unaffected");
    }
}
