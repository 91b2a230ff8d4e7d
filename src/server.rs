//! TCP broadcast endpoint
//!
//! Every accepted connection becomes one [`BroadcastSession`]. There is no
//! handshake and no framing: viewers receive raw terminal output. Anything a
//! viewer sends is read and discarded; end of its input ends its session.

use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::distributor::ClipDistributor;
use crate::session::BroadcastSession;
use crate::types::Pacing;
use crate::{BroadcastError, Result};

/// Listener that spawns one session per viewer
pub struct BroadcastServer {
    listener: TcpListener,
    distributor: Arc<ClipDistributor>,
    pacing: Pacing,
    reset: Arc<[u8]>,
    next_id: AtomicU64,
}

impl BroadcastServer {
    /// Bind the listener
    pub async fn bind(
        addr: SocketAddr,
        distributor: Arc<ClipDistributor>,
        pacing: Pacing,
        reset: Arc<[u8]>,
    ) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| BroadcastError::Bind { addr, source })?;
        info!("Broadcast server listening on {}", listener.local_addr().unwrap_or(addr));
        Ok(Self { listener, distributor, pacing, reset, next_id: AtomicU64::new(1) })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| BroadcastError::connection_failed("local address", e))
    }

    /// Accept viewers until `cancel` fires; sessions are cancelled with it
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Self { listener, distributor, pacing, reset, next_id } = self;
        let mut incoming = TcpListenerStream::new(listener);

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = incoming.next() => accepted,
            };

            let stream = match accepted {
                Some(Ok(stream)) => stream,
                Some(Err(e)) => {
                    // Typically descriptor exhaustion; back off instead of spinning
                    warn!("Failed to accept viewer: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
                None => break,
            };

            let id = next_id.fetch_add(1, Ordering::Relaxed);
            let peer = stream.peer_addr().ok();
            info!(session = id, peer = ?peer, "Viewer connected");
            if let Err(e) = stream.set_nodelay(true) {
                debug!(session = id, "Could not disable Nagle: {}", e);
            }

            let (read_half, write_half) = stream.into_split();
            let session_cancel = cancel.child_token();
            let session = BroadcastSession::new(id, write_half, Arc::clone(&distributor), pacing)
                .with_reset_sequence(Arc::clone(&reset));

            tokio::spawn(discard_input(id, read_half, session_cancel.clone()));
            tokio::spawn(async move {
                match session.run(session_cancel.clone()).await {
                    Ok(stats) => {
                        info!(session = id, clips = stats.clips, bytes = stats.bytes, "Viewer disconnected")
                    }
                    Err(e) => info!(session = id, "Viewer session ended: {}", e),
                }
                session_cancel.cancel();
            });
        }

        info!("Broadcast server stopped");
        Ok(())
    }
}

/// Read and drop viewer input; EOF or a read error ends the session
async fn discard_input(id: u64, mut reader: OwnedReadHalf, cancel: CancellationToken) {
    let mut buf = [0u8; 1024];
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                debug!(session = id, "Viewer closed its side");
                break;
            }
            Ok(n) => debug!(session = id, bytes = n, "Ignoring viewer input"),
            Err(e) => {
                debug!(session = id, "Viewer read failed: {}", e);
                break;
            }
        }
    }
    cancel.cancel();
}
