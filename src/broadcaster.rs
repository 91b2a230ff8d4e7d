//! Source lifecycle management
//!
//! The [`Broadcaster`] owns one driver task per monitored recording plus the
//! shared [`ClipDistributor`]. Discovery feeds it complete scans; the
//! difference against the monitored set starts and stops drivers.
//!
//! A source whose driver failed on malformed data stays in the monitored set
//! until discovery stops reporting its path. Restarting it while the same
//! bytes are still on disk would only fail again. A source that ended cleanly
//! because a new recording replaced its file is restarted on the next scan
//! that still reports the path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::BroadcastConfig;
use crate::discovery::{DiscoverySource, ScanDiff};
use crate::distributor::ClipDistributor;
use crate::driver::{SourceDriver, SourceHandle};
use crate::providers::{ReplayProvider, TailProvider};
use crate::ttyrec::TtyrecReader;
use crate::types::SourceStatus;

pub struct Broadcaster {
    config: BroadcastConfig,
    distributor: Arc<ClipDistributor>,
    sources: Mutex<HashMap<PathBuf, SourceHandle>>,
    one_shots: Mutex<Vec<SourceHandle>>,
}

impl Broadcaster {
    /// Create a broadcaster with no sources
    pub fn new(config: BroadcastConfig) -> Result<Self> {
        config.validate()?;
        let distributor = Arc::new(ClipDistributor::new(config.replay_capacity, config.max_ready));
        Ok(Self {
            config,
            distributor,
            sources: Mutex::new(HashMap::new()),
            one_shots: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Distributor shared with viewer sessions
    pub fn distributor(&self) -> Arc<ClipDistributor> {
        Arc::clone(&self.distributor)
    }

    fn sources(&self) -> MutexGuard<'_, HashMap<PathBuf, SourceHandle>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn one_shots(&self) -> MutexGuard<'_, Vec<SourceHandle>> {
        self.one_shots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reader_for(&self, path: &Path) -> TtyrecReader {
        TtyrecReader::new(path).with_max_payload_len(self.config.max_payload_len)
    }

    /// Start tailing `path`; returns `false` if it is already monitored
    ///
    /// Re-adding a live source nudges its reader to check for new data.
    pub fn add_source<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        let mut sources = self.sources();
        if let Some(handle) = sources.get(path) {
            handle.wake();
            return false;
        }

        let provider = TailProvider::with_reader(self.reader_for(path), self.config.backoff());
        let handle =
            SourceDriver::spawn(provider, self.config.window_seconds, Arc::clone(&self.distributor));
        info!(path = %path.display(), "Monitoring recording");
        sources.insert(path.to_path_buf(), handle);
        true
    }

    /// Stop monitoring `path`, flushing its partial clip
    pub async fn remove_source<P: AsRef<Path>>(&self, path: P) -> Option<SourceStatus> {
        let path = path.as_ref();
        let handle = self.sources().remove(path)?;
        let status = handle.stop().await;
        info!(
            path = %path.display(),
            frames = status.frames,
            clips = status.clips,
            "Stopped monitoring recording"
        );
        Some(status)
    }

    /// Reconcile the monitored set with a complete discovery scan
    pub async fn apply_scan(&self, current: &HashSet<PathBuf>) -> ScanDiff {
        let (diff, replaced) = {
            let sources = self.sources();
            let replaced: Vec<PathBuf> = sources
                .iter()
                .filter(|(path, handle)| {
                    let status = handle.status();
                    current.contains(*path) && status.finished && status.error.is_none()
                })
                .map(|(path, _)| path.clone())
                .collect();
            (ScanDiff::between(sources.keys(), current), replaced)
        };

        for path in &diff.removed {
            self.remove_source(path).await;
        }
        // Ended cleanly while still reported: a new recording took over the path
        for path in &replaced {
            self.remove_source(path).await;
            self.add_source(path);
        }
        for path in &diff.added {
            self.add_source(path);
        }
        self.reap_one_shots();

        if !diff.is_empty() {
            debug!(added = diff.added.len(), removed = diff.removed.len(), "Applied discovery scan");
        }
        diff
    }

    /// Scan `discovery` every `scan_interval_ms` until `cancel` fires
    pub async fn run_discovery<D>(&self, mut discovery: D, cancel: CancellationToken)
    where
        D: DiscoverySource,
    {
        let mut ticker = tokio::time::interval(self.config.scan_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.config.scan_interval_ms, "Discovery started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match discovery.scan().await {
                Ok(current) => {
                    self.apply_scan(&current).await;
                }
                // A failed scan says nothing about which recordings ended
                Err(e) if e.is_retryable() => debug!("Discovery scan failed, retrying: {}", e),
                Err(e) => warn!("Discovery scan failed: {}", e),
            }
        }
        info!("Discovery stopped");
    }

    /// Parse a finished recording once into the same distributor
    pub fn enqueue_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let provider = ReplayProvider::with_reader(self.reader_for(path))?;
        let handle =
            SourceDriver::spawn(provider, self.config.window_seconds, Arc::clone(&self.distributor));
        info!(path = %path.display(), "Queued recording for one-shot replay");
        self.reap_one_shots();
        self.one_shots().push(handle);
        Ok(())
    }

    fn reap_one_shots(&self) {
        self.one_shots().retain(|handle| !handle.is_finished());
    }

    /// Status of every monitored recording, ordered by path
    pub fn list_sources(&self) -> Vec<SourceStatus> {
        let mut statuses: Vec<SourceStatus> =
            self.sources().values().map(SourceHandle::status).collect();
        statuses.sort_by(|a, b| a.path.cmp(&b.path));
        statuses
    }

    pub fn is_monitored<P: AsRef<Path>>(&self, path: P) -> bool {
        self.sources().contains_key(path.as_ref())
    }

    pub fn queue_depth(&self) -> usize {
        self.distributor.queue_depth()
    }

    /// Drop every fresh clip waiting for delivery
    pub fn drain_queue(&self) -> usize {
        self.distributor.drain()
    }

    /// Stop every driver, flushing partial clips
    pub async fn shutdown(&self) {
        let handles: Vec<SourceHandle> = {
            let mut sources = self.sources();
            let mut handles: Vec<SourceHandle> = sources.drain().map(|(_, h)| h).collect();
            handles.append(&mut self.one_shots());
            handles
        };

        let count = handles.len();
        for handle in handles {
            handle.stop().await;
        }
        info!(sources = count, "Broadcaster shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingBuilder, append_bytes, encode_record};
    use std::time::Duration;

    fn fast_config() -> BroadcastConfig {
        BroadcastConfig {
            poll_interval_ms: 5,
            max_poll_interval_ms: 20,
            scan_interval_ms: 10,
            ..BroadcastConfig::default()
        }
    }

    async fn eventually<F: FnMut() -> bool>(mut condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn set(paths: &[&Path]) -> HashSet<PathBuf> {
        paths.iter().map(|p| p.to_path_buf()).collect()
    }

    #[tokio::test]
    async fn scan_adds_and_removal_flushes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alice.tty");
        RecordingBuilder::new(100.0).frames_every(0.0, 1.0, 3).write_to(&path).expect("write");

        let broadcaster = Broadcaster::new(fast_config()).expect("broadcaster");
        let diff = broadcaster.apply_scan(&set(&[&path])).await;
        assert_eq!(diff.added.len(), 1);
        assert!(broadcaster.is_monitored(&path));

        eventually(|| broadcaster.list_sources().first().is_some_and(|s| s.frames == 3)).await;
        assert_eq!(broadcaster.queue_depth(), 0);

        let diff = broadcaster.apply_scan(&HashSet::new()).await;
        assert_eq!(diff.removed.len(), 1);
        assert!(!broadcaster.is_monitored(&path));
        assert_eq!(broadcaster.queue_depth(), 1, "partial window flushed on removal");
    }

    #[tokio::test]
    async fn removal_keeps_records_written_before_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("exit.tty");
        RecordingBuilder::new(10.0).frame(0.0, b"$ exit").write_to(&path).expect("write");

        let broadcaster = Broadcaster::new(BroadcastConfig {
            poll_interval_ms: 500,
            max_poll_interval_ms: 500,
            ..BroadcastConfig::default()
        })
        .expect("broadcaster");
        broadcaster.add_source(&path);
        eventually(|| broadcaster.list_sources()[0].frames == 1).await;

        append_bytes(&path, &encode_record(11, 0, b"logout")).expect("append");
        let status = broadcaster.remove_source(&path).await.expect("was monitored");
        assert_eq!(status.frames, 2);
        assert!(status.error.is_none());

        let clip = broadcaster.distributor().try_next().expect("flushed clip");
        assert_eq!(clip.len(), 2);
        assert_eq!(&*clip.frames()[1].payload, b"logout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recreated_recording_is_followed_again() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reused.tty");
        RecordingBuilder::new(10.0).frame(0.0, b"first").write_to(&path).expect("write");

        let broadcaster = Broadcaster::new(fast_config()).expect("broadcaster");
        broadcaster.apply_scan(&set(&[&path])).await;
        eventually(|| broadcaster.list_sources()[0].frames == 1).await;

        std::fs::remove_file(&path).expect("unlink");
        RecordingBuilder::new(500.0)
            .frame(0.0, b"second")
            .frame(1.0, b"run")
            .write_to(&path)
            .expect("recreate");
        eventually(|| broadcaster.list_sources()[0].finished).await;

        let diff = broadcaster.apply_scan(&set(&[&path])).await;
        assert!(diff.is_empty());
        eventually(|| {
            let status = &broadcaster.list_sources()[0];
            !status.finished && status.frames == 2
        })
        .await;
        broadcaster.shutdown().await;
    }

    #[tokio::test]
    async fn re_adding_is_a_no_op_that_wakes_the_reader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bob.tty");
        RecordingBuilder::new(10.0).frame(0.0, b"a").write_to(&path).expect("write");

        let broadcaster = Broadcaster::new(BroadcastConfig {
            poll_interval_ms: 60_000,
            max_poll_interval_ms: 60_000,
            ..BroadcastConfig::default()
        })
        .expect("broadcaster");
        assert!(broadcaster.add_source(&path));
        eventually(|| broadcaster.list_sources()[0].frames == 1).await;

        append_bytes(&path, &encode_record(11, 0, b"b")).expect("append");
        assert!(!broadcaster.add_source(&path));
        eventually(|| broadcaster.list_sources()[0].frames == 2).await;
        assert_eq!(broadcaster.list_sources().len(), 1);
        broadcaster.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_source_stays_until_it_disappears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad = dir.path().join("bad.tty");
        let mut bytes = encode_record(5, 0, b"ok");
        bytes.extend_from_slice(&[0xFF; 12]);
        std::fs::write(&bad, &bytes).expect("write");

        let broadcaster = Broadcaster::new(fast_config()).expect("broadcaster");
        broadcaster.apply_scan(&set(&[&bad])).await;
        eventually(|| broadcaster.list_sources()[0].finished).await;

        let diff = broadcaster.apply_scan(&set(&[&bad])).await;
        assert!(diff.is_empty(), "finished source is not restarted");
        assert_eq!(broadcaster.distributor().stats().published, 1);

        broadcaster.apply_scan(&HashSet::new()).await;
        assert!(broadcaster.list_sources().is_empty());
    }

    #[tokio::test]
    async fn enqueued_file_publishes_every_window_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("old.tty");
        RecordingBuilder::new(0.0).frames_every(0.0, 10.0, 7).write_to(&path).expect("write");

        let broadcaster = Broadcaster::new(fast_config()).expect("broadcaster");
        broadcaster.enqueue_file(&path).expect("enqueue");
        eventually(|| broadcaster.queue_depth() == 3).await;
        assert!(broadcaster.list_sources().is_empty(), "one-shots are not monitored sources");

        assert!(broadcaster.enqueue_file(dir.path().join("missing.tty")).is_err());
        assert_eq!(broadcaster.drain_queue(), 3);
    }

    #[tokio::test]
    async fn discovery_loop_tracks_scanner() {
        struct Scripted(Arc<Mutex<HashSet<PathBuf>>>);

        #[async_trait::async_trait]
        impl DiscoverySource for Scripted {
            async fn scan(&mut self) -> Result<HashSet<PathBuf>> {
                Ok(self.0.lock().expect("lock").clone())
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("carol.tty");
        RecordingBuilder::new(1.0).frame(0.0, b"hi").write_to(&path).expect("write");

        let current = Arc::new(Mutex::new(set(&[&path])));
        let broadcaster = Arc::new(Broadcaster::new(fast_config()).expect("broadcaster"));
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let broadcaster = Arc::clone(&broadcaster);
            let discovery = Scripted(Arc::clone(&current));
            let cancel = cancel.clone();
            async move { broadcaster.run_discovery(discovery, cancel).await }
        });

        eventually(|| broadcaster.is_monitored(&path)).await;
        current.lock().expect("lock").clear();
        eventually(|| !broadcaster.is_monitored(&path)).await;

        cancel.cancel();
        task.await.expect("discovery task");
    }
}
