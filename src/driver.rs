//! Driver spawns and manages per-source processing tasks

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::distributor::ClipDistributor;
use crate::provider::FrameProvider;
use crate::types::SourceStatus;
use crate::window::WindowAssembler;

/// Handle to one running source task
///
/// Dropping the handle does not stop the task; call [`SourceHandle::stop`].
pub struct SourceHandle {
    path: PathBuf,
    status: watch::Receiver<SourceStatus>,
    cancel: CancellationToken,
    wake: Option<Arc<Notify>>,
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest status published by the task
    pub fn status(&self) -> SourceStatus {
        self.status.borrow().clone()
    }

    /// Status changes as a stream, starting with the current value
    pub fn status_updates(&self) -> WatchStream<SourceStatus> {
        WatchStream::new(self.status.clone())
    }

    /// Whether the task has ended on its own or after a stop
    pub fn is_finished(&self) -> bool {
        self.task.is_finished() || self.status.borrow().finished
    }

    /// Nudge a tailing reader to re-check its file now
    pub fn wake(&self) {
        if let Some(wake) = &self.wake {
            wake.notify_one();
        }
    }

    /// Request the task to stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the task and wait until its partial clip has been flushed
    pub async fn stop(self) -> SourceStatus {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(path = %self.path.display(), "Source task failed: {}", e);
        }
        let status = self.status.borrow().clone();
        status
    }
}

/// Driver spawns one owned task per source: read, window, publish
pub struct SourceDriver;

impl SourceDriver {
    /// Spawn a task that drains `provider` into `distributor`
    pub fn spawn<P>(
        provider: P,
        window_seconds: f64,
        distributor: Arc<ClipDistributor>,
    ) -> SourceHandle
    where
        P: FrameProvider,
    {
        let path = provider.path().to_path_buf();
        let wake = provider.wake_hint();
        let (status_tx, status_rx) = watch::channel(SourceStatus::new(path.clone()));
        let cancel = CancellationToken::new();
        let assembler = WindowAssembler::new(Arc::new(path.clone()), window_seconds);

        let cancel_task = cancel.clone();
        let task = tokio::spawn(async move {
            Self::source_task(provider, assembler, distributor, status_tx, cancel_task).await;
        });

        SourceHandle { path, status: status_rx, cancel, wake, task }
    }

    /// Source task - reads frames until the stream ends, fails, or is cancelled
    async fn source_task<P>(
        mut provider: P,
        mut assembler: WindowAssembler,
        distributor: Arc<ClipDistributor>,
        status_tx: watch::Sender<SourceStatus>,
        cancel: CancellationToken,
    ) where
        P: FrameProvider,
    {
        let path = provider.path().to_path_buf();
        info!(path = %path.display(), "Source task started");
        let mut frame_count = 0u64;
        let mut failure = None;
        let mut cancelled = false;

        loop {
            // Cancellation only lands between records; a frame is never half-read
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(path = %path.display(), "Source cancelled");
                    cancelled = true;
                    break;
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    frame_count += 1;
                    trace!(
                        path = %path.display(),
                        time = frame.time,
                        bytes = frame.payload.len(),
                        "Frame {}",
                        frame_count
                    );

                    let sealed = assembler.push(frame);
                    let published = sealed.is_some();
                    if let Some(clip) = sealed {
                        distributor.publish(clip);
                    }

                    let offset = provider.offset();
                    status_tx.send_modify(|status| {
                        status.offset = offset;
                        status.frames = frame_count;
                        if published {
                            status.clips += 1;
                        }
                    });
                }
                Ok(None) => {
                    info!(path = %path.display(), "Recording ended after {} frames", frame_count);
                    break;
                }
                Err(e) => {
                    // Only this source stops; the distributor and other sources carry on
                    warn!(path = %path.display(), "Source stream terminated: {}", e);
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        // Records the writer completed before the stop are still part of the clip
        if cancelled {
            loop {
                match provider.try_next_frame() {
                    Ok(Some(frame)) => {
                        frame_count += 1;
                        if let Some(clip) = assembler.push(frame) {
                            distributor.publish(clip);
                            status_tx.send_modify(|status| status.clips += 1);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %path.display(), "Source stream terminated while draining: {}", e);
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        let flushed = assembler.finish();
        if let Some(clip) = flushed.as_ref() {
            debug!(path = %path.display(), frames = clip.len(), "Flushing partial clip");
        }
        let published = flushed.is_some();
        if let Some(clip) = flushed {
            distributor.publish(clip);
        }

        let offset = provider.offset();
        status_tx.send_modify(|status| {
            status.offset = offset;
            status.frames = frame_count;
            if published {
                status.clips += 1;
            }
            status.finished = true;
            status.error = failure;
        });

        info!(
            path = %path.display(),
            frames = frame_count,
            clips = assembler.sealed(),
            "Source task ended"
        );
    }
}
