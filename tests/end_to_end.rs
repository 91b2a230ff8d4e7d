//! Full pipeline: recordings on disk through the broadcaster to a TCP viewer

use anyhow::{Context, Result, ensure};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use ttyrec_tv::server::BroadcastServer;
use ttyrec_tv::{BroadcastConfig, Broadcaster, Pacing};

/// Write `count` records one second apart, starting at `start`
fn write_recording(path: &Path, start: u32, count: u32, label: &str) -> Result<()> {
    let mut bytes = Vec::new();
    for i in 0..count {
        let payload = format!("{} {}\r\n", label, i);
        bytes.extend_from_slice(&(start + i).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload.as_bytes());
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn fast_config() -> BroadcastConfig {
    BroadcastConfig {
        listen: "127.0.0.1:0".parse().expect("addr"),
        poll_interval_ms: 5,
        max_poll_interval_ms: 20,
        pacing: Pacing::Capped(0.005),
        ..BroadcastConfig::default()
    }
}

async fn eventually<F: FnMut() -> bool>(what: &str, mut condition: F) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .with_context(|| format!("timed out waiting for {}", what))
}

async fn start_server(broadcaster: &Broadcaster) -> Result<(std::net::SocketAddr, CancellationToken)> {
    let config = broadcaster.config();
    let server = BroadcastServer::bind(
        config.listen,
        broadcaster.distributor(),
        config.pacing,
        config.reset_bytes(),
    )
    .await?;
    let addr = server.local_addr()?;
    let cancel = CancellationToken::new();
    tokio::spawn(server.run(cancel.clone()));
    Ok((addr, cancel))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_sources_reach_a_viewer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let alice = dir.path().join("alice.tty");
    let bob = dir.path().join("bob.tty");
    write_recording(&alice, 1_700_000_000, 40, "alice")?;
    write_recording(&bob, 1_700_100_000, 40, "bob")?;

    let broadcaster = Broadcaster::new(fast_config())?;
    let (addr, cancel) = start_server(&broadcaster).await?;
    let mut viewer = TcpStream::connect(addr).await.context("connecting viewer")?;

    let scan: HashSet<PathBuf> = [alice.clone(), bob.clone()].into_iter().collect();
    broadcaster.apply_scan(&scan).await;
    eventually("both sources fully read", || {
        let sources = broadcaster.list_sources();
        sources.len() == 2 && sources.iter().all(|s| s.frames == 40 && s.clips == 1)
    })
    .await?;

    // Removal flushes the trailing 10-second window of each source
    let diff = broadcaster.apply_scan(&HashSet::new()).await;
    ensure!(diff.removed.len() == 2, "expected both sources removed, got {:?}", diff);
    let stats = broadcaster.distributor().stats();
    ensure!(stats.published >= 4, "expected at least 4 clips, got {}", stats.published);

    let pool = broadcaster.distributor().pool_snapshot();
    for source in [&alice, &bob] {
        let clips = pool.iter().filter(|c| c.source() == source.as_path()).count();
        ensure!(clips >= 2, "expected 2 clips from {}, got {}", source.display(), clips);
    }

    // The viewer keeps receiving output with no long silences, including
    // after every fresh clip has been delivered and replay takes over
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    let mut last = Instant::now();
    let deadline = last + Duration::from_millis(1500);
    while Instant::now() < deadline {
        let n = tokio::time::timeout(Duration::from_secs(1), viewer.read(&mut buf))
            .await
            .context("viewer stalled for a full second")??;
        ensure!(n > 0, "server closed the viewer connection");
        received.extend_from_slice(&buf[..n]);
        ensure!(last.elapsed() < Duration::from_secs(1), "gap in viewer output");
        last = Instant::now();
    }

    let text = String::from_utf8_lossy(&received);
    ensure!(text.starts_with("\x1bc"), "stream must open with a terminal reset");
    ensure!(text.contains("alice") && text.contains("bob"), "viewer saw both sources");

    cancel.cancel();
    broadcaster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_source_is_isolated() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.tty");
    let bad = dir.path().join("bad.tty");
    write_recording(&good, 1_000, 35, "good")?;
    let mut garbage = vec![0u8; 12];
    garbage[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&bad, garbage)?;

    let broadcaster = Broadcaster::new(fast_config())?;
    let scan: HashSet<PathBuf> = [good.clone(), bad.clone()].into_iter().collect();
    broadcaster.apply_scan(&scan).await;

    eventually("bad source to stop", || {
        broadcaster.list_sources().iter().any(|s| s.path == bad && s.finished)
    })
    .await?;
    eventually("good source to seal a window", || {
        broadcaster.list_sources().iter().any(|s| s.path == good && s.clips == 1 && !s.finished)
    })
    .await?;

    let first = broadcaster.distributor().next().await;
    ensure!(first.source() == good.as_path(), "only the good source publishes");
    ensure!(first.len() == 30, "first window holds 30 frames, got {}", first.len());

    broadcaster.shutdown().await;
    Ok(())
}
